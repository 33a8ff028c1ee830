#![deny(unreachable_pub)]

//! Pre-Request Executor (§4.6) and Request Builder & Response Parser (§4.7):
//! the data-driven half of the upload pipeline. A host is described
//! entirely by a [`sidecar_types::HttpRequestSpec`]; adding one doesn't
//! require a new code path here, only a new spec.

mod error;
mod html_extract;
mod json_path;
mod method;
mod pre_request;
mod request;
mod response;

pub use error::HttpError;
pub use html_extract::extract_html_value;
pub use json_path::get_json_value;
pub use method::parse_method;
pub use pre_request::{execute_pre_request, PreRequestOutcome};
pub use request::send_upload_request;
pub use response::{parse_upload_response, ParsedUpload};
