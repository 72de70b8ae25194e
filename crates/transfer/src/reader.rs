use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::types::PartSpec;

/// Reads the byte range of individual parts from a file on disk.
///
/// Each read opens its own handle, so one reader can be shared by
/// concurrently running part uploads.
#[derive(Debug, Clone)]
pub struct PartReader {
    path: PathBuf,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` and records its size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file_size: meta.len(),
        })
    }

    /// Reads exactly `part.byte_length` bytes starting at `part.byte_offset`.
    pub async fn read(&self, part: &PartSpec) -> Result<Vec<u8>, TransferError> {
        if part.end() > self.file_size {
            return Err(TransferError::InvalidRange {
                part_number: part.part_number,
                offset: part.byte_offset,
                length: part.byte_length,
                file_size: self.file_size,
            });
        }

        let mut buf = vec![0u8; part.byte_length as usize];
        if buf.is_empty() {
            return Ok(buf);
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(part.byte_offset)).await?;
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size observed when the reader was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}
