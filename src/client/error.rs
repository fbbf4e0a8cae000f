use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server refused the stored credentials; they have been cleared.
    #[error("session expired, please log in again")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token storage error: {0}")]
    TokenStore(#[from] std::io::Error),

    #[error("malformed token file: {0}")]
    TokenFormat(#[from] serde_json::Error),

    #[error("not logged in")]
    NotLoggedIn,
}

/// Pulls a human readable message out of an error body, trying `message`,
/// then `error`, then `detail`.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        })
}
