//! Local-directory backend for development and tests.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/blobs/<key>        object payloads
//! <root>/meta/<key>.json    sidecar: recorded content type + etag
//! ```
//!
//! Payload writes go to a `.tmp-*` file first and are renamed into place;
//! deletes prune directories the removal left empty. Size and timestamp come
//! straight from the blob file, so the sidecar only has to track what the
//! filesystem cannot: the content type and the checksum.
//!
//! Signed URLs have no provider to come from here, so the store signs its
//! own via [`UrlSigner`] — they point back at the gateway's raw-download
//! route.

use super::{ObjectMeta, ObjectReader, ObjectStore, StoreError, StoreResult, signer::UrlSigner};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const BLOBS_DIR: &str = "blobs";
const META_DIR: &str = "meta";
const TMP_PREFIX: &str = ".tmp-";

/// Per-object fields the filesystem cannot recover on its own.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: Option<String>,
    etag: Option<String>,
}

#[derive(Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(BLOBS_DIR).join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{key}.json"))
    }

    /// Sidecar reads never fail the caller: a missing file means "no
    /// recorded metadata", and a corrupt one degrades to the same after a
    /// warning.
    async fn read_sidecar(&self, key: &str) -> Sidecar {
        match fs::read(self.meta_path(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("corrupt metadata sidecar for `{key}`: {err}");
                Sidecar::default()
            }),
            Err(_) => Sidecar::default(),
        }
    }

    async fn write_sidecar(&self, key: &str, sidecar: &Sidecar) -> StoreResult<()> {
        let meta_path = self.meta_path(key);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&meta_path, serde_json::to_vec(sidecar)?).await?;
        Ok(())
    }

    /// Walk the whole blob tree and collect keys by raw `starts_with` —
    /// prefixes are plain string prefixes here, not directory boundaries,
    /// matching what a real object store does with its key space.
    async fn walk_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let blobs_root = self.root.join(BLOBS_DIR);

        let mut keys = Vec::new();
        // Iterative walk; async recursion would need boxing.
        let mut pending = vec![blobs_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Nothing stored yet.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                        // In-flight upload, not an object yet.
                        continue;
                    }
                    let path = entry.path();
                    if let Ok(rel) = path.strip_prefix(&blobs_root) {
                        let key = rel
                            .iter()
                            .map(|part| part.to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let keys = self.walk_keys(prefix).await?;
        let mut metas = Vec::with_capacity(keys.len());
        for key in keys {
            match self.stat(&key).await {
                Ok(meta) => metas.push(meta),
                // Deleted while we were walking.
                Err(StoreError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(metas)
    }

    /// The walk alone, skipping the per-key stat and sidecar reads.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.walk_keys(prefix).await
    }

    async fn stat(&self, key: &str) -> StoreResult<ObjectMeta> {
        let metadata = fs::metadata(self.blob_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        if !metadata.is_file() {
            // A directory is key-space structure, not an object.
            return Err(StoreError::NotFound(key.to_string()));
        }

        let sidecar = self.read_sidecar(key).await;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: metadata.len() as i64,
            updated: modified_time(&metadata),
            content_type: sidecar.content_type,
            etag: sidecar.etag,
        })
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta> {
        let blob_path = self.blob_path(key);
        let parent = blob_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &blob_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&blob_path).await?;
                fs::rename(&tmp_path, &blob_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        let etag = format!("{:x}", md5::compute(&data));
        self.write_sidecar(
            key,
            &Sidecar {
                content_type,
                etag: Some(etag),
            },
        )
        .await?;

        self.stat(key).await
    }

    async fn reader(&self, key: &str) -> StoreResult<(ObjectMeta, ObjectReader)> {
        let meta = self.stat(key).await?;
        let file = File::open(self.blob_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok((meta, Box::new(file)))
    }

    /// Unlike S3, a delete here reports `NotFound` for a missing key — the
    /// filesystem tells us for free, so we pass it on.
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let blob_path = self.blob_path(key);
        match fs::remove_file(&blob_path).await {
            Ok(()) => debug!("removed blob {}", blob_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        let meta_path = self.meta_path(key);
        if let Err(err) = fs::remove_file(&meta_path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!("failed to remove sidecar {}: {}", meta_path.display(), err);
            }
        }

        // Drop directories this delete emptied, in both trees.
        let blobs_root = self.root.join(BLOBS_DIR);
        if let Some(parent) = blob_path.parent() {
            prune_empty_dirs(parent, &blobs_root).await;
        }
        let meta_root = self.root.join(META_DIR);
        if let Some(parent) = meta_path.parent() {
            prune_empty_dirs(parent, &meta_root).await;
        }

        Ok(())
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> StoreResult<()> {
        // The sidecar alone does not make an object.
        self.stat(key).await?;
        let mut sidecar = self.read_sidecar(key).await;
        sidecar.content_type = Some(content_type.to_string());
        self.write_sidecar(key, &sidecar).await
    }

    /// Signing is local and unconditional — like a provider presigner, it
    /// does not check that the key exists.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StoreResult<String> {
        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(self.signer.signed_url(key, expires_at))
    }

    /// Write/read/delete a probe file under the root.
    async fn ping(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.root).await?;
        let probe = self.root.join(format!(".ping-{}", Uuid::new_v4()));
        fs::write(&probe, b"ping").await?;
        let bytes = fs::read(&probe).await?;
        let _ = fs::remove_file(&probe).await;
        if bytes != b"ping" {
            return Err(StoreError::Unavailable(
                "probe file content mismatch".into(),
            ));
        }
        Ok(())
    }
}

/// Timestamps older than the platform epoch collapse to `now`; they cannot
/// occur for files we wrote ourselves.
fn modified_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Remove empty directories upward from `start`, stopping at `stop`.
///
/// Stops on the first non-empty or missing directory and swallows errors —
/// pruning is cosmetic, never load-bearing.
async fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut current = start.to_path_buf();
    while current.starts_with(stop) && current != stop {
        match fs::remove_dir(&current).await {
            Ok(()) => {
                if let Some(parent) = current.parent() {
                    current = parent.to_path_buf();
                } else {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => break,
            Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
            Err(err) => {
                debug!("failed to prune directory {}: {}", current.display(), err);
                break;
            }
        }
    }
}
