#![deny(unreachable_pub)]

//! Session State Store (§4.5): one record per service, protected by a
//! per-service read/write lock. Upload paths consult it under a read lock;
//! login routines hold the write lock for the whole login sequence so
//! concurrent workers observe a consistent post-login view and the backend
//! is contacted at most once per login burst.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    Anon,
    Authenticating,
    Authenticated,
    Failed,
}

/// Everything a service's adapter may accumulate across its lifetime. Not
/// every field is meaningful for every service; adapters read only the
/// ones their host's protocol needs.
#[derive(Debug, Clone, Default)]
pub struct ServiceSession {
    pub login_state: LoginState,
    pub cookie_jar: Option<Arc<reqwest::cookie::Jar>>,
    pub session_id: Option<String>,
    pub csrf_token: Option<String>,
    pub upload_token: Option<String>,
    pub upload_endpoint: Option<String>,
    pub security_token: Option<String>,
    pub extra: HashMap<String, String>,
}

impl ServiceSession {
    pub fn is_authenticated(&self) -> bool {
        self.login_state == LoginState::Authenticated
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    LoginFailed(String),
}

/// Process-wide registry of per-service session state, created empty and
/// populated lazily on first login. Never persisted to disk.
pub struct SessionStore {
    services: RwLock<HashMap<String, Arc<RwLock<ServiceSession>>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self { services: RwLock::new(HashMap::new()) }
    }

    async fn service_lock(&self, service: &str) -> Arc<RwLock<ServiceSession>> {
        if let Some(existing) = self.services.read().await.get(service) {
            return existing.clone();
        }
        let mut services = self.services.write().await;
        services
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(ServiceSession::default())))
            .clone()
    }

    /// Snapshot of a service's current session state (read-locked).
    pub async fn snapshot(&self, service: &str) -> ServiceSession {
        self.service_lock(service).await.read().await.clone()
    }

    /// Ensures `service` is authenticated, invoking `login` at most once per
    /// login burst even under concurrent callers. A caller that finds the
    /// state already `Authenticated` returns immediately without touching
    /// the write lock. `login` receives the current snapshot and, on
    /// success, the full session it should replace; a `Failed` state is
    /// retried by the next caller rather than cached as permanent.
    pub async fn login_if_needed<F, Fut>(
        &self,
        service: &str,
        login: F,
    ) -> Result<ServiceSession, SessionError>
    where
        F: FnOnce(ServiceSession) -> Fut,
        Fut: Future<Output = Result<ServiceSession, String>>,
    {
        let lock = self.service_lock(service).await;

        {
            let snapshot = lock.read().await;
            if snapshot.is_authenticated() {
                return Ok(snapshot.clone());
            }
        }

        let mut guard = lock.write().await;
        if guard.is_authenticated() {
            return Ok(guard.clone());
        }
        guard.login_state = LoginState::Authenticating;
        let current = guard.clone();

        match login(current).await {
            Ok(mut updated) => {
                updated.login_state = LoginState::Authenticated;
                *guard = updated;
                Ok(guard.clone())
            }
            Err(msg) => {
                guard.login_state = LoginState::Failed;
                Err(SessionError::LoginFailed(msg))
            }
        }
    }

    /// Applies a mutation under the service's write lock, for adapters that
    /// need to update session fields outside a full login sequence (e.g.
    /// refreshing a forum security token).
    pub async fn mutate<F>(&self, service: &str, f: F)
    where
        F: FnOnce(&mut ServiceSession),
    {
        let lock = self.service_lock(service).await;
        let mut guard = lock.write().await;
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn login_if_needed_returns_authenticated_snapshot() {
        let store = SessionStore::new();
        let session = store
            .login_if_needed("imgbox", |mut s| async move {
                s.session_id = Some("abc".into());
                Ok(s)
            })
            .await
            .unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.session_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn second_caller_after_success_does_not_invoke_login_again() {
        let store = SessionStore::new();
        store.login_if_needed("imgbox", |mut s| async move {
            s.session_id = Some("abc".into());
            Ok(s)
        }).await.unwrap();

        let session = store
            .login_if_needed("imgbox", |_s| async { panic!("must not be called twice") })
            .await
            .unwrap();
        assert_eq!(session.session_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn concurrent_logins_contact_the_backend_at_most_once() {
        let store = StdArc::new(SessionStore::new());
        let calls = StdArc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                store
                    .login_if_needed("viper", move |mut s| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                            s.security_token = Some("tok".into());
                            Ok(s)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_login_is_retried_by_the_next_caller() {
        let store = SessionStore::new();
        let first = store.login_if_needed("forum", |_s| async { Err("bad creds".to_string()) }).await;
        assert!(first.is_err());

        let second = store
            .login_if_needed("forum", |mut s| async move {
                s.security_token = Some("tok".into());
                Ok(s)
            })
            .await
            .unwrap();
        assert!(second.is_authenticated());
    }

    #[tokio::test]
    async fn mutate_applies_under_the_services_write_lock() {
        let store = SessionStore::new();
        store.mutate("forum", |s| s.security_token = Some("refreshed".into())).await;
        let snapshot = store.snapshot("forum").await;
        assert_eq!(snapshot.security_token.as_deref(), Some("refreshed"));
    }
}
