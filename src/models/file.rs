//! Derived view of one stored object.

use crate::store::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single file entry, as returned by listings and uploads.
///
/// Never persisted — recomputed from the backend listing on every call. Wire
/// names follow the storage provider's object fields: the full key is the
/// `name`, the recorded content type is `type`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FileRecord {
    /// Full object key, `/`-separated.
    pub name: String,

    /// Payload size in bytes.
    pub size: i64,

    /// Last-modified timestamp (RFC 3339).
    pub updated: DateTime<Utc>,

    /// Content type; `null` when the backend has none recorded and the
    /// extension gave nothing to infer from.
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

impl From<ObjectMeta> for FileRecord {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            name: meta.key,
            size: meta.size,
            updated: meta.updated,
            content_type: meta.content_type,
        }
    }
}
