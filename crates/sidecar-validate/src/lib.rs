#![deny(unreachable_pub)]

//! Validation (§4.10): rejects jobs with an unknown action, a malformed
//! service tag, an empty file list where one is required, or a file that
//! fails path validation.

use std::path::PathBuf;

use sidecar_types::Job;

pub const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("service tag must not be empty")]
    MissingService,
    #[error("service tag '{0}' contains characters outside [A-Za-z0-9.-]")]
    InvalidServiceTag(String),
    #[error("action requires a non-empty file list")]
    NoFiles,
    #[error("path '{0}' must not be empty")]
    EmptyPath(String),
    #[error("path '{0}' contains a traversal segment")]
    PathTraversal(String),
    #[error("path '{0}' does not exist")]
    FileNotFound(String),
    #[error("path '{0}' is not a regular file")]
    NotARegularFile(String),
    #[error("file '{path}' is {size} bytes, exceeding the 100 MiB limit")]
    FileTooLarge { path: String, size: u64 },
}

/// Validates a service tag: non-empty, and drawn only from
/// `[A-Za-z0-9.-]`.
pub fn validate_service_tag(tag: &str) -> Result<(), ValidationError> {
    if tag.is_empty() {
        return Err(ValidationError::MissingService);
    }
    if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return Err(ValidationError::InvalidServiceTag(tag.to_string()));
    }
    Ok(())
}

/// Validates a single file path: non-empty, free of `..` traversal
/// segments, and, once made absolute, an existing regular file no larger
/// than [`MAX_FILE_SIZE_BYTES`]. Returns the canonicalized absolute path.
pub async fn validate_file_path(raw: &str) -> Result<PathBuf, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPath(raw.to_string()));
    }
    if raw.contains("..") {
        return Err(ValidationError::PathTraversal(raw.to_string()));
    }

    let absolute = tokio::fs::canonicalize(raw)
        .await
        .map_err(|_| ValidationError::FileNotFound(raw.to_string()))?;
    let metadata = tokio::fs::metadata(&absolute)
        .await
        .map_err(|_| ValidationError::FileNotFound(raw.to_string()))?;

    if !metadata.is_file() {
        return Err(ValidationError::NotARegularFile(absolute.display().to_string()));
    }
    if metadata.len() > MAX_FILE_SIZE_BYTES {
        return Err(ValidationError::FileTooLarge { path: absolute.display().to_string(), size: metadata.len() });
    }
    Ok(absolute)
}

/// Validates a whole job: its service tag (if the action requires one),
/// its file list (if the action requires files), and every file's path.
/// Returns the canonicalized paths in the job's original order.
pub async fn validate_job(job: &Job) -> Result<Vec<PathBuf>, ValidationError> {
    if job.action.requires_service() {
        validate_service_tag(&job.service)?;
    }
    if job.action.requires_files() && job.files.is_empty() {
        return Err(ValidationError::NoFiles);
    }

    let mut validated = Vec::with_capacity(job.files.len());
    for file in &job.files {
        validated.push(validate_file_path(file).await?);
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_types::Action;
    use std::collections::HashMap;
    use std::io::Write;

    fn job(action: Action, service: &str, files: Vec<String>) -> Job {
        Job {
            action,
            service: service.to_string(),
            files,
            credentials: HashMap::new(),
            config: HashMap::new(),
            request: None,
            rate_limit: None,
            retry: None,
        }
    }

    #[test]
    fn accepts_well_formed_service_tags() {
        assert!(validate_service_tag("pixhost.to").is_ok());
        assert!(validate_service_tag("imgbb-mirror").is_ok());
    }

    #[test]
    fn rejects_empty_or_malformed_service_tags() {
        assert!(matches!(validate_service_tag(""), Err(ValidationError::MissingService)));
        assert!(matches!(
            validate_service_tag("bad service!"),
            Err(ValidationError::InvalidServiceTag(_))
        ));
    }

    #[tokio::test]
    async fn rejects_any_occurrence_of_dot_dot_as_traversal() {
        let result = validate_file_path("/tmp/../etc/passwd").await;
        assert!(matches!(result, Err(ValidationError::PathTraversal(_))));
    }

    #[tokio::test]
    async fn rejects_missing_files() {
        let result = validate_file_path("/tmp/does-not-exist-surely.jpg").await;
        assert!(matches!(result, Err(ValidationError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn rejects_files_over_the_size_cap() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // Sparse file: set_len avoids actually writing 100+ MiB to disk.
        file.as_file().set_len(MAX_FILE_SIZE_BYTES + 1).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let result = validate_file_path(&path).await;
        assert!(matches!(result, Err(ValidationError::FileTooLarge { .. })));
    }

    #[tokio::test]
    async fn accepts_files_at_or_under_the_size_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"small file").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(validate_file_path(&path).await.is_ok());
    }

    #[tokio::test]
    async fn upload_job_without_files_is_rejected() {
        let j = job(Action::Upload, "imgbb", vec![]);
        assert!(matches!(validate_job(&j).await, Err(ValidationError::NoFiles)));
    }

    #[tokio::test]
    async fn generate_thumb_does_not_require_a_service_tag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fake image bytes").unwrap();
        let j = job(Action::GenerateThumb, "", vec![file.path().to_str().unwrap().to_string()]);
        assert!(validate_job(&j).await.is_ok());
    }

    #[tokio::test]
    async fn login_job_requires_a_service_tag_but_not_files() {
        let j = job(Action::Login, "", vec![]);
        assert!(matches!(validate_job(&j).await, Err(ValidationError::MissingService)));
    }
}
