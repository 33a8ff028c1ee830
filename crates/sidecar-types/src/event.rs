use serde::{Deserialize, Serialize};

/// Per-file lifecycle status reported on the stdout protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Uploading,
    Done,
    Failed,
    Timeout,
}

/// Progress sample for a single in-flight file upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Average bytes/sec over the whole upload so far.
    pub speed: f64,
    pub percentage: f64,
    pub eta_seconds: f64,
}

/// The payload of a `result` event. Per-file uploads fill `file`/`url`/`thumb`;
/// job-level operations (login, gallery create, ...) fill `status`/`msg`/`data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ResultPayload {
    pub fn upload_success(file: impl Into<String>, url: impl Into<String>, thumb: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            url: Some(url.into()),
            thumb: Some(thumb.into()),
            ..Default::default()
        }
    }

    pub fn job_success(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            status: Some("success".into()),
            msg: Some(msg.into()),
            data,
            ..Default::default()
        }
    }

    pub fn job_failure(msg: impl Into<String>) -> Self {
        Self {
            status: Some("failed".into()),
            msg: Some(msg.into()),
            ..Default::default()
        }
    }
}

/// The tagged union of every event the sidecar may write to stdout, one JSON
/// document per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Log {
        msg: String,
    },
    Status {
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        status: FileStatus,
    },
    Result(ResultPayload),
    Progress {
        file: String,
        data: ProgressData,
    },
    Data {
        data: serde_json::Value,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        msg: String,
    },
    BatchComplete {
        status: String,
    },
}

impl OutputEvent {
    pub fn log(msg: impl Into<String>) -> Self {
        OutputEvent::Log { msg: msg.into() }
    }

    pub fn status(file: impl Into<String>, status: FileStatus) -> Self {
        OutputEvent::Status { file: Some(file.into()), status }
    }

    pub fn error(file: Option<String>, msg: impl Into<String>) -> Self {
        OutputEvent::Error { file, msg: msg.into() }
    }

    pub fn batch_complete() -> Self {
        OutputEvent::BatchComplete { status: "done".to_string() }
    }
}
