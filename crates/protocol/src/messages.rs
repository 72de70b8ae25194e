use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of `POST /upload/createMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultipartUpload {
    pub identifier: String,
    pub file_name: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub content_type: String,
    pub folder: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Upload state reported by `getUploadProgress` and `createMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// The content is already fully stored under `path`.
    #[serde(default, deserialize_with = "null_default")]
    pub finished: bool,
    /// Access URL, only meaningful when `finished` is set.
    #[serde(default, deserialize_with = "null_default")]
    pub path: String,
    #[serde(default)]
    pub task_record: Option<TaskRecord>,
}

/// Server-side record of a multipart upload session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub upload_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub file_identifier: String,
    #[serde(default, deserialize_with = "null_default")]
    pub file_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub bucket_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub object_key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub total_size: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub chunk_size: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub chunk_num: u32,
    /// Parts the storage backend already holds.
    #[serde(default, deserialize_with = "null_default")]
    pub exit_part_list: Vec<PartSummary>,
}

impl TaskRecord {
    /// Part numbers the backend reports as received.
    pub fn completed_parts(&self) -> impl Iterator<Item = u32> + '_ {
        self.exit_part_list.iter().map(|p| p.part_number)
    }
}

/// One part already held by the storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    pub part_number: u32,
    #[serde(default, deserialize_with = "null_default")]
    pub size: u64,
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Result of `merge` and of the direct `/upload` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub access_url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
}

/// Server-pushed notification carried in an SSE `data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl NotifyMessage {
    /// Parses the JSON payload of one SSE event.
    pub fn from_event_data(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Returns a string field from `data`, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// Jackson writes absent values as `null`; treat them like missing fields.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Backends emit numeric database ids in some places and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}
