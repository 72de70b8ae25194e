use serde::{Deserialize, Serialize};

use crate::constants::SUCCESS_CODE;

/// Envelope wrapping every JSON response from the backend.
///
/// `data` is optional on the wire: failed calls and calls with no result
/// omit it or send `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: Some(data),
            msg: None,
        }
    }

    /// Creates a failed envelope with the given code and message.
    pub fn error(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            msg: Some(msg.into()),
        }
    }

    /// Returns `true` if `code` is the success sentinel.
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Message to show for a failed envelope.
    pub fn message(&self) -> &str {
        match self.msg.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => "request failed",
        }
    }
}
