//! Data types for the upload flow.

use std::fmt;
use std::path::{Path, PathBuf};

use chunkferry_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_HASH_WINDOW};

/// Per-client upload settings.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Part size for new sessions. Resumed sessions must match it.
    pub chunk_size: u64,
    /// Read window used while fingerprinting.
    pub hash_window: usize,
    /// Extra merge attempts after a network-level failure.
    pub merge_retries: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash_window: DEFAULT_HASH_WINDOW,
            merge_retries: 1,
        }
    }
}

/// A local file to upload and where it should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    /// Destination folder relative to the storage root; empty for the root.
    pub folder: String,
}

impl FileUpload {
    /// Uses the path's file name and guesses the content type from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = detect_content_type(&path)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            path,
            file_name,
            content_type,
            folder: String::new(),
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Content type for common extensions.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("mp4") => Some("video/mp4"),
        Some("mkv") => Some("video/x-matroska"),
        Some("mp3") => Some("audio/mpeg"),
        Some("pdf") => Some("application/pdf"),
        Some("zip") => Some("application/zip"),
        Some("gz" | "tgz") => Some("application/gzip"),
        Some("txt" | "log") => Some("text/plain"),
        Some("json") => Some("application/json"),
        _ => None,
    }
}

/// Where an upload currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Probing,
    Creating,
    Resuming,
    UploadingParts,
    Merging,
    Done,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Idle => "idle",
            UploadState::Probing => "probing",
            UploadState::Creating => "creating",
            UploadState::Resuming => "resuming",
            UploadState::UploadingParts => "uploading parts",
            UploadState::Merging => "merging",
            UploadState::Done => "done",
            UploadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress event emitted while an upload runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    StateChanged(UploadState),
    /// A part was stored. `completed` counts distinct parts, resumed ones included.
    PartCompleted {
        part_number: u32,
        completed: u32,
        total: u32,
    },
    Finished { access_url: String },
    Failed { error: String },
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub access_url: String,
    pub file_id: String,
    /// Parts sent during this run (0 for instant completion).
    pub parts_uploaded: u32,
    /// The backend already held an unfinished session for this content.
    pub resumed: bool,
}
