#![deny(unreachable_pub)]

//! Core data types shared across the image-upload sidecar: the job and event
//! protocol, and the data-driven HTTP request/response specs that let a new
//! host be added without a new code path in the upload pipeline.

mod event;
mod job;
mod rate_limit;
mod request_spec;
mod retry;

pub use event::{FileStatus, OutputEvent, ProgressData, ResultPayload};
pub use job::{Action, Job};
pub use rate_limit::RateLimitConfig;
pub use request_spec::{
    FieldKind, HttpRequestSpec, MultipartFieldSpec, PreRequestResponseType, PreRequestSpec,
    ResponseParserKind, ResponseParserSpec, MAX_PRE_REQUEST_CHAIN_DEPTH,
};
pub use retry::RetryConfig;
