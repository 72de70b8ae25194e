use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::messages::null_default;

/// Storage backend an upload is routed to, sent as the `Storage-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// The backend's own disk. Parts go through `/upload/part`.
    #[default]
    Local,
    Minio,
    Oss,
    Obs,
}

impl StorageType {
    /// Header/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Minio => "minio",
            StorageType::Oss => "oss",
            StorageType::Obs => "obs",
        }
    }

    /// Object stores hand out pre-signed part URLs; local storage does not.
    pub fn uses_presigned_parts(self) -> bool {
        !matches!(self, StorageType::Local)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a storage type name is not one of `local|minio|oss|obs`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown storage type: {0}")]
pub struct UnknownStorageType(pub String);

impl FromStr for StorageType {
    type Err = UnknownStorageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageType::Local),
            "minio" => Ok(StorageType::Minio),
            "oss" => Ok(StorageType::Oss),
            "obs" => Ok(StorageType::Obs),
            _ => Err(UnknownStorageType(s.to_string())),
        }
    }
}

/// A stored file as listed by the file library endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub file_identifier: String,
    #[serde(default, deserialize_with = "null_default")]
    pub file_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub object_key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub total_size: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub content_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub access_url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub storage_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub create_time: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub current: u64,
}

impl<T> Page<T> {
    /// Number of pages implied by `total` and `size`.
    pub fn page_count(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}

/// One entry of a backend host directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// Absolute path on the backend host.
    #[serde(default, deserialize_with = "null_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub folder: bool,
    /// `None` for files, for empty folders and below the depth limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or_default()
    }
}

/// Outcome of rebuilding the host file index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    /// Milliseconds spent indexing.
    #[serde(default, deserialize_with = "null_default")]
    pub index_time: u64,
    /// Drive roots actually indexed; unknown names are dropped.
    #[serde(default, deserialize_with = "null_default")]
    pub drives: Vec<String>,
    /// Index memory in MiB, preformatted by the server.
    #[serde(default, deserialize_with = "null_default")]
    pub memory_usage: String,
    #[serde(default, deserialize_with = "null_default")]
    pub indexed_file_count: u64,
}

/// Renames the file at `absolute_path` to `new_name` within its folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFile {
    pub absolute_path: String,
    pub new_name: String,
}

/// The access password as reported by `getPassword`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PasswordInfo {
    pub password: String,
    /// The caller is the host's main user and may change the password.
    pub main_user: bool,
}

impl PasswordInfo {
    /// Parses the wire value: the password followed by a `1` or `0`
    /// main-user flag.
    pub fn from_wire(raw: &str) -> Self {
        match raw.char_indices().last() {
            Some((idx, flag @ ('0' | '1'))) => Self {
                password: raw[..idx].to_string(),
                main_user: flag == '1',
            },
            _ => Self {
                password: raw.to_string(),
                main_user: false,
            },
        }
    }
}

/// Whether LAN sharing is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareStatus(pub bool);
