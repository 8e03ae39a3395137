//! The `{ok, result}` response envelope used by every Bot API method.

use serde::{Deserialize, Serialize};

/// Bot API response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    /// A missing field already reads as `None`; `default` here would demand
    /// `T: Default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error_code: None,
            description: None,
        }
    }

    pub fn error(error_code: u16, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error_code: Some(error_code),
            description: Some(description.into()),
        }
    }

    /// Split into the result or `(error_code, description)`.
    pub fn into_result(self) -> Result<T, (u16, String)> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err((
                self.error_code.unwrap_or(500),
                self.description
                    .unwrap_or_else(|| "response carried no result".to_string()),
            )),
        }
    }
}
