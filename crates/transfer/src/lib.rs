//! Local side of a chunked upload: fingerprinting a file, splitting it
//! into numbered parts and reading each part's bytes back.

mod hasher;
mod plan;
mod reader;
mod types;
mod validation;

pub use hasher::{fingerprint_file, fingerprint_reader};
pub use plan::plan;
pub use reader::PartReader;
pub use types::{FileFingerprint, PartSpec, UploadPlan};
pub use validation::validate_folder;

/// Default part size: 5 MiB, the smallest part object stores accept.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Default hashing window: 20 MiB.
pub const DEFAULT_HASH_WINDOW: usize = 20 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("part {part_number} out of range: {offset}+{length} exceeds file size {file_size}")]
    InvalidRange {
        part_number: u32,
        offset: u64,
        length: u64,
        file_size: u64,
    },

    #[error("{0} parts exceed the part-number range")]
    TooManyParts(u64),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
