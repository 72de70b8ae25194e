use std::path::Path;
use std::time::Instant;

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::types::FileFingerprint;
use crate::{DEFAULT_HASH_WINDOW, TransferError};

/// Fingerprints the file at `path` by streaming it in `window`-byte reads.
///
/// If `window` is 0, [`DEFAULT_HASH_WINDOW`] (20 MiB) is used. The window only
/// bounds memory use; the digest covers the whole byte stream, so any window
/// size yields the same fingerprint.
pub async fn fingerprint_file(path: &Path, window: usize) -> Result<FileFingerprint, TransferError> {
    let started = Instant::now();
    let file = tokio::fs::File::open(path).await?;
    let fingerprint = fingerprint_reader(file, window).await?;
    debug!(
        path = %path.display(),
        fingerprint = %fingerprint,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "file fingerprint computed"
    );
    Ok(fingerprint)
}

/// Fingerprints everything `reader` yields.
///
/// A failed read discards all progress; there is no partial result.
pub async fn fingerprint_reader<R>(mut reader: R, window: usize) -> Result<FileFingerprint, TransferError>
where
    R: AsyncRead + Unpin,
{
    let window = if window == 0 { DEFAULT_HASH_WINDOW } else { window };
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; window];

    loop {
        let filled = fill_window(&mut reader, &mut buf).await?;
        if filled == 0 {
            break;
        }
        hasher.update(&buf[..filled]);
        if filled < window {
            break;
        }
    }

    Ok(FileFingerprint::from_hex(hex::encode(hasher.finalize())))
}

/// Reads until `buf` is full or the reader hits EOF. Returns bytes read.
async fn fill_window<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
