//! src/services/gateway_service.rs
//!
//! GatewayService — folder/file CRUD over a flat object store. Folders are
//! not stored anywhere: a folder is the set of keys sharing a first path
//! segment, held in existence by a zero-byte `.keep` marker object when it
//! has no real files. Every operation is a single pass-through (or a short
//! sequential chain) of backend calls; there is no retained state, no
//! locking and no retry policy of our own.

use crate::models::{file::FileRecord, preview::FilePreview};
use crate::store::{
    ObjectMeta, ObjectReader, ObjectStore, StoreError, StoreResult, signer::UrlSigner,
};
use bytes::Bytes;
use chrono::Utc;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Marker file name that keeps an otherwise-empty folder listable.
pub const FOLDER_MARKER: &str = ".keep";

const MAX_OBJECT_KEY_LEN: usize = 1024;
/// Validity window for preview URLs.
const PREVIEW_URL_TTL: Duration = Duration::from_secs(15 * 60);
/// Largest text file the preview endpoint inlines instead of signing.
const INLINE_TEXT_LIMIT: i64 = 1024 * 1024;

/// GatewayService translates folder/file requests into key-prefix operations:
/// - List folders (distinct first segments of the key listing)
/// - Create folder (write the `.keep` marker)
/// - List files under a prefix (marker-filtered, content types inferred)
/// - Upload / delete a file, delete a folder prefix
/// - Preview a file (inline text or a short-lived signed URL)
///
/// It owns no data. The backing [`ObjectStore`] is the single source of
/// truth and every listing is recomputed from it.
#[derive(Clone)]
pub struct GatewayService {
    store: Arc<dyn ObjectStore>,
    /// Verifier for locally-signed download URLs. `None` when the provider
    /// signs its own URLs (S3 backend), which leaves the raw route inert.
    signer: Option<UrlSigner>,
}

impl GatewayService {
    pub fn new(store: Arc<dyn ObjectStore>, signer: Option<UrlSigner>) -> Self {
        Self { store, signer }
    }

    /// Distinct first path segments across all object keys, sorted ascending.
    ///
    /// A key contributes a folder iff it contains `/`; keys without one are
    /// loose objects and belong to no folder. Only the keys matter here, so
    /// this takes the metadata-free listing.
    pub async fn list_folders(&self) -> StoreResult<Vec<String>> {
        let keys = self.store.list_keys("").await?;
        let mut folders = BTreeSet::new();
        for key in keys {
            if let Some((first, _)) = key.split_once('/') {
                folders.insert(first.to_string());
            }
        }
        Ok(folders.into_iter().collect())
    }

    /// Write the folder's `.keep` marker. Re-creating an existing folder
    /// overwrites the marker, which is a no-op in every observable way.
    pub async fn create_folder(&self, name: &str) -> StoreResult<String> {
        self.ensure_folder_name_safe(name)?;
        let marker = format!("{name}/{FOLDER_MARKER}");
        self.store.put(&marker, Bytes::new(), None).await?;
        debug!("created folder marker `{marker}`");
        Ok(name.to_string())
    }

    /// Every object whose key starts with `prefix`, minus folder markers.
    ///
    /// The prefix is a raw string prefix, not a directory: `do` matches both
    /// `do/x` and `docs/y`. Objects without a recorded content type get one
    /// inferred from their extension and written back, best-effort.
    pub async fn list_files(&self, prefix: &str) -> StoreResult<Vec<FileRecord>> {
        let objects = self.store.list(prefix).await?;
        let mut records = Vec::with_capacity(objects.len());
        for meta in objects {
            if is_folder_marker(&meta.key) {
                continue;
            }
            let meta = self.ensure_content_type(meta).await;
            records.push(FileRecord::from(meta));
        }
        Ok(records)
    }

    /// Write `folder/name` with the given bytes and declared content type,
    /// silently overwriting any existing object, and return its record.
    pub async fn upload_file(
        &self,
        folder: &str,
        name: &str,
        content: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<FileRecord> {
        self.ensure_folder_name_safe(folder)?;
        if name.is_empty() {
            return Err(StoreError::invalid("file name", "must not be empty"));
        }
        let key = format!("{folder}/{name}");
        self.ensure_key_safe(&key)?;

        let meta = self.store.put(&key, content, content_type).await?;
        debug!("uploaded `{}` ({} bytes)", meta.key, meta.size);
        Ok(FileRecord::from(meta))
    }

    /// Delete every object under `name/`, the marker included.
    ///
    /// Sequential and not atomic: the first failure aborts the loop and is
    /// reported as the result, with earlier deletions left in place. A
    /// folder that resolves to zero objects deletes vacuously.
    pub async fn delete_folder(&self, name: &str) -> StoreResult<()> {
        self.ensure_folder_name_safe(name)?;
        let prefix = format!("{name}/");
        let keys = self.store.list_keys(&prefix).await?;
        let count = keys.len();
        for key in &keys {
            self.store.delete(key).await?;
        }
        debug!("deleted {count} objects under `{prefix}`");
        Ok(())
    }

    /// Delete exactly one object. Whether a missing key errors is the
    /// backend's native behavior: S3 succeeds idempotently, the local store
    /// reports `NotFound`.
    pub async fn delete_file(&self, key: &str) -> StoreResult<()> {
        self.ensure_key_safe(key)?;
        self.store.delete(key).await
    }

    /// Build the preview for one object.
    ///
    /// Text up to [`INLINE_TEXT_LIMIT`] is fetched and inlined; media types
    /// (image/video/audio/PDF) and everything else get a signed URL valid
    /// for fifteen minutes from issuance. Fails with `NotFound` when the key
    /// is absent.
    pub async fn preview_file(&self, key: &str) -> StoreResult<FilePreview> {
        self.ensure_key_safe(key)?;
        let meta = self.store.stat(key).await?;
        let meta = self.ensure_content_type(meta).await;
        let content_type = meta.content_type.clone();

        if let Some(ct) = content_type.as_deref() {
            if ct.starts_with("text/") && meta.size <= INLINE_TEXT_LIMIT {
                let (_, mut reader) = self.store.reader(key).await?;
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                return Ok(FilePreview::Text {
                    content: String::from_utf8_lossy(&buf).into_owned(),
                    content_type,
                    size: meta.size,
                    name: meta.key,
                });
            }
        }

        let url = self.store.presigned_get_url(key, PREVIEW_URL_TTL).await?;
        if content_type.as_deref().is_some_and(is_media_type) {
            Ok(FilePreview::Media {
                url,
                content_type,
                size: meta.size,
                name: meta.key,
            })
        } else {
            Ok(FilePreview::File {
                url,
                content_type,
                size: meta.size,
                name: meta.key,
            })
        }
    }

    /// Open an object for a locally-signed download.
    ///
    /// Only meaningful on a backend that signs through us: without a signer
    /// every key is `NotFound`, and a bad or expired token is refused the
    /// way the provider refuses an expired signed URL.
    pub async fn open_signed(
        &self,
        key: &str,
        expires_at: i64,
        token: &str,
    ) -> StoreResult<(ObjectMeta, ObjectReader)> {
        let Some(signer) = &self.signer else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        if !signer.verify(key, expires_at, token, Utc::now().timestamp()) {
            return Err(StoreError::PermissionDenied(
                "signed URL is invalid or expired".into(),
            ));
        }
        self.store.reader(key).await
    }

    /// Readiness probe straight through to the backend.
    pub async fn ping(&self) -> StoreResult<()> {
        self.store.ping().await
    }

    /// Fill in a missing content type from the key's extension.
    ///
    /// The inferred value is written back to the object's metadata so later
    /// calls see it as recorded; persistence failure is logged and the
    /// inferred value is still used, so a flaky backend never fails a
    /// listing over metadata.
    async fn ensure_content_type(&self, mut meta: ObjectMeta) -> ObjectMeta {
        if meta.content_type.is_some() {
            return meta;
        }
        let Some(inferred) = mime_guess::from_path(&meta.key).first_raw() else {
            return meta;
        };
        if let Err(err) = self.store.set_content_type(&meta.key, inferred).await {
            warn!("failed to persist content type for `{}`: {}", meta.key, err);
        }
        meta.content_type = Some(inferred.to_string());
        meta
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty and oversized keys, keys beginning with `/`, and keys
    /// containing `..`, control bytes, NUL or backslash.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid("object key", "must not be empty"));
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::invalid(
                "object key",
                "must not exceed 1024 bytes",
            ));
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::invalid(
                "object key",
                "must not start with `/` or contain `..`",
            ));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::invalid(
                "object key",
                "must not contain control bytes or backslashes",
            ));
        }
        Ok(())
    }

    /// Folder names are single path segments: everything a key may contain,
    /// except `/`.
    fn ensure_folder_name_safe(&self, name: &str) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::invalid("folder name", "must not be empty"));
        }
        if name.contains('/') {
            return Err(StoreError::invalid("folder name", "must not contain `/`"));
        }
        self.ensure_key_safe(name)
    }
}

/// True for the zero-byte objects that only exist to keep a folder listable.
fn is_folder_marker(key: &str) -> bool {
    key.ends_with(&format!("/{FOLDER_MARKER}"))
}

/// Content types the preview client renders inline from a URL.
fn is_media_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type.starts_with("audio/")
        || content_type == "application/pdf"
}
