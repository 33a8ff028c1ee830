use reqwest::Method;

use crate::error::HttpError;

pub fn parse_method(method: &str) -> Result<Method, HttpError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        other => Err(HttpError::UnsupportedMethod(other.to_string())),
    }
}
