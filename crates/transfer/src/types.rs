use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Content-derived identity of a file: lower-case hex MD5 of every byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFingerprint(String);

impl FileFingerprint {
    /// Wraps an already computed digest string.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One contiguous byte range of a file, uploaded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSpec {
    /// 1-based, contiguous.
    pub part_number: u32,
    pub byte_offset: u64,
    pub byte_length: u64,
}

impl PartSpec {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.byte_offset + self.byte_length
    }
}

/// The fixed part layout of one file upload.
///
/// `chunk_size` is fixed for the plan's lifetime; resuming against a session
/// created with a different chunk size is a state conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    fingerprint: FileFingerprint,
    total_size: u64,
    chunk_size: u64,
    parts: Vec<PartSpec>,
}

impl UploadPlan {
    /// Plans `total_size` bytes in `chunk_size` parts.
    pub fn new(
        fingerprint: FileFingerprint,
        total_size: u64,
        chunk_size: u64,
    ) -> Result<Self, TransferError> {
        let parts = crate::plan(total_size, chunk_size)?;
        Ok(Self {
            fingerprint,
            total_size,
            chunk_size,
            parts,
        })
    }

    pub fn fingerprint(&self) -> &FileFingerprint {
        &self.fingerprint
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn parts(&self) -> &[PartSpec] {
        &self.parts
    }

    /// Never truncates: `plan` refuses layouts beyond `u32::MAX` parts.
    pub fn part_count(&self) -> u32 {
        self.parts.last().map_or(0, |p| p.part_number)
    }

    /// Returns part `n` (1-based).
    pub fn part(&self, part_number: u32) -> Option<&PartSpec> {
        let idx = part_number.checked_sub(1)? as usize;
        self.parts.get(idx)
    }

    /// Returns `true` if `part_number` is one of this plan's parts.
    pub fn contains(&self, part_number: u32) -> bool {
        (1..=self.part_count()).contains(&part_number)
    }

    /// The full part-number set `1..=N`.
    pub fn part_numbers(&self) -> BTreeSet<u32> {
        (1..=self.part_count()).collect()
    }

    /// Parts not in `completed`, in part-number order.
    pub fn remaining(&self, completed: &BTreeSet<u32>) -> Vec<PartSpec> {
        self.parts
            .iter()
            .filter(|p| !completed.contains(&p.part_number))
            .copied()
            .collect()
    }
}
