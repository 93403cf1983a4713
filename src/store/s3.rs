//! S3-compatible production backend.
//!
//! Talks to AWS itself or any S3-compatible endpoint (MinIO, GCS in interop
//! mode). Credentials come from the SDK's standard environment chain; bucket,
//! region and endpoint come from [`connect`](S3ObjectStore::connect). A custom
//! endpoint switches the client to path-style addressing, which is what
//! non-AWS deployments expect.
//!
//! Error mapping is deliberately coarse: a missing key becomes
//! [`StoreError::NotFound`], everything else collapses to
//! [`StoreError::Unavailable`] with the SDK's full error chain preserved in
//! the message so the log line stays useful.

use super::{ObjectMeta, ObjectReader, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    error::{DisplayErrorContext, SdkError},
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as SmithyDateTime},
    types::MetadataDirective,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One bucket on an S3-compatible endpoint.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Wrap an already-configured SDK client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the environment credential chain.
    ///
    /// `operation_timeout` bounds every backend call; there is no retry
    /// policy here beyond whatever the SDK applies on its own.
    pub async fn connect(
        bucket: impl Into<String>,
        region: String,
        endpoint: Option<String>,
        operation_timeout: Duration,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(operation_timeout)
                    .build(),
            );
        if let Some(url) = &endpoint {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if endpoint.is_some() {
            // MinIO and friends do not resolve virtual-host bucket names.
            builder = builder.force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    /// Paginated ListObjectsV2 plus a HEAD per key.
    ///
    /// S3 listings omit the content type, but the trait promises complete
    /// metadata — callers must be able to tell "unset at the backend" apart
    /// from "not reported by the listing". The HEADs run sequentially,
    /// matching the one-request-at-a-time model of the rest of the gateway.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut metas = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| unavailable("list objects", err))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                match self.stat(key).await {
                    Ok(meta) => metas.push(meta),
                    // Deleted between the listing page and the HEAD.
                    Err(StoreError::NotFound(_)) => continue,
                    Err(err) => return Err(err),
                }
            }
        }
        // ListObjectsV2 pages arrive in ascending key order already.
        Ok(metas)
    }

    /// One ListObjectsV2 round trip per page and nothing else — no HEAD
    /// hydration, since callers of this are about to throw metadata away.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| unavailable("list objects", err))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn stat(&self, key: &str) -> StoreResult<ObjectMeta> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    unavailable("head object", err)
                }
            })?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: head.content_length().unwrap_or(0),
            updated: head
                .last_modified()
                .map(timestamp_to_utc)
                .unwrap_or_default(),
            content_type: head.content_type().map(str::to_string),
            etag: head.e_tag().map(unquote_etag),
        })
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| unavailable("put object", err))?;

        // Read back what the backend now holds; its size and timestamp are
        // authoritative, not ours.
        self.stat(key).await
    }

    async fn reader(&self, key: &str) -> StoreResult<(ObjectMeta, ObjectReader)> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    unavailable("get object", err)
                }
            })?;

        let meta = ObjectMeta {
            key: key.to_string(),
            size: resp.content_length().unwrap_or(0),
            updated: resp
                .last_modified()
                .map(timestamp_to_utc)
                .unwrap_or_default(),
            content_type: resp.content_type().map(str::to_string),
            etag: resp.e_tag().map(unquote_etag),
        };
        Ok((meta, Box::new(resp.body.into_async_read())))
    }

    /// S3 deletes are idempotent: removing a missing key reports success.
    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| unavailable("delete object", err))?;
        Ok(())
    }

    /// Self-copy with `MetadataDirective::Replace` — the only way S3 changes
    /// an object's content type in place.
    async fn set_content_type(&self, key: &str, content_type: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(encode_copy_source(&self.bucket, key))
            .key(key)
            .content_type(content_type)
            .metadata_directive(MetadataDirective::Replace)
            .send()
            .await
            .map_err(|err| unavailable("copy object", err))?;
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StoreResult<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StoreError::Unavailable(format!("presigning config: {err}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| unavailable("presign get object", err))?;
        Ok(request.uri().to_string())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| unavailable("head bucket", err))?;
        Ok(())
    }
}

/// Collapse an SDK failure into `Unavailable`, keeping the full error chain
/// in the message so the eventual log line carries the real cause.
fn unavailable<E, R>(operation: &'static str, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    StoreError::Unavailable(format!("{operation}: {}", DisplayErrorContext(&err)))
}

/// SDK timestamps are plain epoch pairs; errors collapse to the epoch itself.
fn timestamp_to_utc(ts: &SmithyDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos()).unwrap_or_default()
}

/// S3 wraps etags in quotes on the wire; store them bare like the local
/// backend does.
fn unquote_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// `x-amz-copy-source` wants `bucket/url-encoded-key` with the slashes kept.
fn encode_copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_source_is_segment_encoded() {
        assert_eq!(
            encode_copy_source("media", "docs/annual report.pdf"),
            "media/docs/annual%20report.pdf"
        );
        assert_eq!(encode_copy_source("media", "plain.txt"), "media/plain.txt");
    }

    #[test]
    fn etag_quotes_are_stripped() {
        assert_eq!(unquote_etag("\"abc123\""), "abc123");
        assert_eq!(unquote_etag("abc123"), "abc123");
    }

    #[test]
    fn sdk_timestamps_convert() {
        let ts = SmithyDateTime::from_secs(1_700_000_000);
        assert_eq!(timestamp_to_utc(&ts).timestamp(), 1_700_000_000);
    }
}
