//! Client error types.

use std::time::Duration;

use thiserror::Error;

use crate::poll::PollTimeout;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the mock server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The server answered with `ok: false`.
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    /// Long-poll deadline passed with nothing to return.
    #[error("no updates within {} ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl From<PollTimeout> for ClientError {
    fn from(err: PollTimeout) -> Self {
        Self::Timeout {
            timeout: err.timeout,
        }
    }
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
