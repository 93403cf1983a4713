//! Flat object-store backends.
//!
//! The gateway never talks to a concrete backend directly: everything goes
//! through the [`ObjectStore`] trait, which models the provider as a flat
//! key/value blob space (no native directory concept). Two implementations
//! ship with the binary:
//!
//! - [`s3::S3ObjectStore`] — any S3-compatible endpoint (AWS, MinIO, GCS
//!   interop), the production backend.
//! - [`fs::FsObjectStore`] — a local directory, used for development and in
//!   tests.

pub mod fs;
pub mod s3;
pub mod signer;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{io, time::Duration};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Per-object metadata as reported by the backend.
///
/// `content_type` is `None` when the backend has no recorded type for the
/// object; the gateway treats that as "unset" and may infer one.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Full object key, `/`-separated.
    pub key: String,

    /// Payload size in bytes.
    pub size: i64,

    /// Last-modified timestamp.
    pub updated: DateTime<Utc>,

    /// Recorded content type, if any.
    pub content_type: Option<String>,

    /// Backend checksum, if any (MD5 hex for both shipped backends).
    pub etag: Option<String>,
}

/// Boxed byte stream handed out by [`ObjectStore::reader`].
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("access denied: {0}")]
    PermissionDenied(String),
    #[error("invalid {what}: {reason}")]
    InvalidArgument { what: String, reason: String },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("metadata serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Build an `InvalidArgument` without the call-site `.to_string()` noise.
    pub fn invalid(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One flat bucket of blobs.
///
/// Listing is always recursive (a prefix filter over the whole key space) and
/// ordered by key ascending. Implementations must return *complete* metadata
/// from `list`: backends whose listing API omits fields (S3 leaves out the
/// content type) are expected to fill the gap themselves so callers can tell
/// "unset at the backend" from "not reported by the listing".
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>>;

    /// Keys only, same prefix filter and order as [`list`](ObjectStore::list).
    ///
    /// The cheap listing for callers that discard metadata (folder listing,
    /// prefix deletion): backends that pay extra requests to complete their
    /// `list` metadata skip all of that here.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Metadata for a single object. `NotFound` if the key is absent.
    async fn stat(&self, key: &str) -> StoreResult<ObjectMeta>;

    /// Write an object, silently overwriting any previous value, and return
    /// the metadata the backend now holds for it.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta>;

    /// Open an object for streaming reads.
    async fn reader(&self, key: &str) -> StoreResult<(ObjectMeta, ObjectReader)>;

    /// Delete one object. Whether a missing key is an error is the backend's
    /// call: S3 deletes are idempotent, the local store reports `NotFound`.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Update the recorded content type without touching the payload.
    async fn set_content_type(&self, key: &str, content_type: &str) -> StoreResult<()>;

    /// Produce a time-limited, credential-free read URL for one object.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StoreResult<String>;

    /// Cheap readiness probe against the backend.
    async fn ping(&self) -> StoreResult<()>;
}
