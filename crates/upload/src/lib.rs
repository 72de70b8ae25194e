//! Resumable chunked uploads.
//!
//! [`UploadClient`] drives one file through the backend's multipart
//! upload protocol:
//!
//! 1. **Hash** the file into a content fingerprint
//! 2. **Look up** the backend for an existing session under that fingerprint
//! 3. **Create** a session, or **resume** the one found
//! 4. **Upload** the parts the backend does not have yet, through a shared
//!    bounded-concurrency [`Queue`](chunkferry_queue::Queue)
//! 5. **Merge** once every part number is known to be stored
//!
//! The backend is reached through the [`UploadApi`] trait; [`HttpUploadApi`]
//! is the real implementation, tests substitute a mock.

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::{ApiFuture, DirectUpload, HttpUploadApi, PartDestination, UploadApi};
pub use client::UploadClient;
pub use error::UploadError;
pub use types::{FileUpload, UploadConfig, UploadEvent, UploadResult, UploadState, detect_content_type};
