//! HTTP transport for the chunkferry backend.
//!
//! [`HttpTransport`] wraps a `reqwest` client with one request interceptor
//! (attaches the `Authorization` credential) and one response interceptor
//! (unwraps the `{code, data, msg}` envelope and notifies the user on
//! application failures). Failures come back as [`TransportError`], which
//! keeps network-level problems apart from application-level ones so callers
//! can retry only the former.

mod client;
mod credential;
mod request;
mod sse;

pub use client::{HttpTransport, TransportConfig};
pub use credential::{CredentialProvider, StaticCredential};
pub use request::{Form, Request};
pub use reqwest::Method;
pub use sse::{SseDecoder, SseEvent};

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, timeout, reset, or the body could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The envelope carried a non-success `code`. `notified` is set when
    /// the response interceptor already showed it.
    #[error("{message} (code {code})")]
    Application {
        code: i64,
        message: String,
        notified: bool,
    },

    /// The body was not a valid envelope, or carried no data where data was required.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl TransportError {
    /// Network-level failures: worth retrying.
    ///
    /// Covers connection problems, HTTP 5xx and 429, and malformed bodies.
    /// Application failures, other HTTP statuses and local request-building
    /// mistakes are not.
    pub fn is_network(&self) -> bool {
        match self {
            TransportError::Network(e) => !e.is_builder(),
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::Decode(_) => true,
            TransportError::Application { .. } | TransportError::InvalidHeader(_) => false,
        }
    }

    /// Whether the response interceptor already showed this failure to the user.
    pub fn was_notified(&self) -> bool {
        matches!(self, TransportError::Application { notified: true, .. })
    }
}
