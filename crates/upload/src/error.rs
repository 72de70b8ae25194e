//! Upload error types.

use chunkferry_queue::Retryable;
use chunkferry_transfer::TransferError;
use chunkferry_transport::TransportError;

/// Errors produced by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Local file could not be hashed or read.
    #[error("local file error: {0}")]
    Read(#[from] TransferError),

    /// The upload request itself is unusable, e.g. a folder escaping the root.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Connection, timeout, 5xx or malformed response. Retried by the queue.
    #[error("network error: {0}")]
    Network(TransportError),

    /// The backend refused the request.
    #[error("rejected by server: {0}")]
    Application(TransportError),

    /// The backend's session does not match the local plan; restart fresh.
    #[error("session state conflict: {0}")]
    StateConflict(String),

    /// Some parts never reached the backend.
    #[error("parts {missing:?} did not upload: {source}")]
    PartsFailed {
        missing: Vec<u32>,
        source: Box<UploadError>,
    },

    #[error("upload cancelled")]
    Cancelled,

    /// The backend answered with something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl UploadError {
    /// Whether the user has already been shown this failure.
    pub fn was_notified(&self) -> bool {
        match self {
            UploadError::Application(e) | UploadError::Network(e) => e.was_notified(),
            UploadError::PartsFailed { source, .. } => source.was_notified(),
            _ => false,
        }
    }

    /// Whether a failed part makes the rest of the upload pointless.
    ///
    /// Exhausted network retries are not: sibling parts may still land and
    /// a rerun resumes from them.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UploadError::Network(_) | UploadError::Cancelled)
    }

    /// Part numbers still missing, if the failure happened while uploading parts.
    pub fn missing_parts(&self) -> &[u32] {
        match self {
            UploadError::PartsFailed { missing, .. } => missing,
            _ => &[],
        }
    }
}

impl From<TransportError> for UploadError {
    fn from(e: TransportError) -> Self {
        if e.is_network() {
            UploadError::Network(e)
        } else {
            UploadError::Application(e)
        }
    }
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Network(_))
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}
