//! Wire types shared by the chunkferry client crates.
//!
//! Everything the backend returns is wrapped in an [`ApiResponse`] envelope;
//! the payload types for the upload, file-library and notification
//! endpoints live in [`messages`] and [`types`].

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{STORAGE_TYPE_HEADER, SUCCESS_CODE};
pub use envelope::ApiResponse;
pub use messages::{
    CreateMultipartUpload, MergeResult, NotifyMessage, PartSummary, TaskInfo, TaskRecord,
};
pub use types::{
    FileNode, FileRecord, IndexResult, Page, PasswordInfo, RenameFile, ShareStatus, StorageType,
    UnknownStorageType,
};
