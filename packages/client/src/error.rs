//! Error types for the viewer chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The access token was rejected (unknown, inactive or expired)
    #[error("Access denied: {0}")]
    Unauthorized(String),

    /// The token is valid but does not grant what was asked for
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, try again later")]
    RateLimited,

    /// Any other non-success answer from the server
    #[error("Server error ({status}): {reason}")]
    Server { status: u16, reason: String },

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Build from an HTTP status and the `{"error": reason}` body the server sends.
    pub fn from_status(status: u16, reason: String) -> Self {
        match status {
            401 => ClientError::Unauthorized(reason),
            403 => ClientError::Forbidden(reason),
            429 => ClientError::RateLimited,
            _ => ClientError::Server { status, reason },
        }
    }

    /// Errors that a reconnect cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_) | ClientError::Forbidden(_))
    }
}

/// Pull the reason out of an error body, falling back to the raw text.
pub(crate) fn reason_from_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}
