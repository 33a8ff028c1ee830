use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::adapter::AdapterContext;
use crate::error::AdapterError;

const VIPER_SERVICE: &str = "viper";
const LOGIN_URL: &str = "https://forum.example/login.php?do=login";
const INDEX_URL: &str = "https://forum.example/";
const THANK_YOU_PHRASE: &str = "Thanks for logging in";
const REDIRECT_PHRASE: &str = "If your browser does not redirect";
const THREAD_VIEW_PATH: &str = "/showthread.php";

static SECURITY_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"securitytoken["']?\s*[:=]\s*["']([a-zA-Z0-9-]+)["']"#).expect("valid regex"));

/// The forum adapter (`viper_login`/`viper_post`). Distinct from the image
/// hosts: it authenticates with a legacy MD5-hashed password field sent
/// twice, and posting needs only a non-guest security token, not a full
/// login, so an already-anonymous session can often still post.
pub struct ViperAdapter;

impl Default for ViperAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViperAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Not a security choice, the remote protocol dictates it: the vBulletin
    /// login form wants the password MD5-hashed, sent in two identical
    /// fields for legacy clients.
    pub async fn login(&self, ctx: &AdapterContext<'_>, credentials: &HashMap<String, String>) -> Result<(), AdapterError> {
        let username = credentials.get("username").cloned().unwrap_or_default();
        let password = credentials.get("password").cloned().unwrap_or_default();
        let client = ctx.client.clone();

        ctx.session
            .login_if_needed(VIPER_SERVICE, move |mut session| async move {
                let password_md5 = format!("{:x}", md5::compute(password.as_bytes()));
                let mut form = HashMap::new();
                form.insert("vb_login_username".to_string(), username);
                form.insert("vb_login_md5password".to_string(), password_md5.clone());
                form.insert("vb_login_md5password_utf".to_string(), password_md5);

                let response = client.post(LOGIN_URL).form(&form).send().await.map_err(|e| e.to_string())?;
                let body = response.text().await.map_err(|e| e.to_string())?;

                if !body.contains(THANK_YOU_PHRASE) {
                    return Err("forum login was not accepted".to_string());
                }
                let token = SECURITY_TOKEN_RE
                    .captures(&body)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| "forum login succeeded but no security token was found".to_string())?;

                session.security_token = Some(token);
                Ok(session)
            })
            .await?;
        Ok(())
    }

    /// Ensures a non-guest security token is available, refreshing it from
    /// the forum index if the session has none yet.
    async fn ensure_token(&self, ctx: &AdapterContext<'_>) -> Result<String, AdapterError> {
        let snapshot = ctx.session.snapshot(VIPER_SERVICE).await;
        if let Some(token) = snapshot.security_token.filter(|t| t != "guest") {
            return Ok(token);
        }

        let body = ctx.client.get(INDEX_URL).send().await?.text().await?;
        let token = SECURITY_TOKEN_RE
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "guest".to_string());

        ctx.session.mutate(VIPER_SERVICE, |s| s.security_token = Some(token.clone())).await;
        Ok(token)
    }

    pub async fn post(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
        thread_id: &str,
        message: &str,
    ) -> Result<(), AdapterError> {
        let _ = self.login(ctx, credentials).await;
        ctx.rate_limiter.wait(VIPER_SERVICE, ctx.cancel).await?;
        let token = self.ensure_token(ctx).await?;

        let mut form = HashMap::new();
        form.insert("securitytoken".to_string(), token);
        form.insert("message".to_string(), message.to_string());
        form.insert("do".to_string(), "postreply".to_string());

        let url = format!("https://forum.example/newreply.php?do=postreply&t={thread_id}");
        let response = ctx.client.post(&url).form(&form).send().await?;
        let final_url = response.url().to_string();
        let body = response.text().await?;

        let succeeded =
            body.contains(THANK_YOU_PHRASE) || body.contains(REDIRECT_PHRASE) || final_url.contains(THREAD_VIEW_PATH);
        if !succeeded {
            return Err(AdapterError::PostFailed(format!("response did not indicate success, final url {final_url}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_token_regex_matches_common_inline_forms() {
        let body = r#"var SECURITYTOKEN = "1234567890-abcdef"; vBulletin.securitytoken = '1234567890-abcdef';"#;
        let caps = SECURITY_TOKEN_RE.captures(body).unwrap();
        assert_eq!(&caps[1], "1234567890-abcdef");
    }
}
