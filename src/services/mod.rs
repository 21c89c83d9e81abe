//! HTTP clients for the external collaborators.

pub mod agent;
pub mod backend;
pub mod llm;
pub mod voice;

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Network-level timeout for every outbound request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Walk a JSON pointer and return the string there, if every step exists.
pub(crate) fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
