//! HTTP handlers for file operations.
//!
//! Uploads arrive as multipart forms, previews come back as `type`-tagged
//! JSON, and locally-signed downloads stream the object body instead of
//! buffering it. Storage concerns stay behind `GatewayService`.

use crate::{
    errors::AppError, services::gateway_service::GatewayService, store::ObjectMeta,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query half of a locally-signed download URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub token: Option<String>,
}

/// GET `/files/{prefix}/` — file records for every key starting with the
/// prefix, folder markers excluded.
pub async fn list_files(
    State(service): State<GatewayService>,
    Path(prefix): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let files = service.list_files(&prefix).await?;
    Ok(Json(files))
}

/// POST `/files/upload/{folder}/` — multipart upload, field name `file`.
///
/// The object key is `folder/<client file name>`; an existing object under
/// that key is overwritten silently. Replies 201 with the file record.
pub async fn upload_file(
    State(service): State<GatewayService>,
    Path(folder): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("reading multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("uploaded file has no name"))?;
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("reading uploaded file: {err}")))?;

        let record = service
            .upload_file(&folder, &name, content, content_type)
            .await?;
        return Ok((StatusCode::CREATED, Json(record)));
    }

    Err(AppError::bad_request("no file was sent"))
}

/// DELETE `/files/delete/{*file_path}` — delete exactly one object.
pub async fn delete_file(
    State(service): State<GatewayService>,
    Path(file_path): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_file(trim_route_slash(&file_path)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/files/preview/{*file_path}` — inline text or a signed URL.
pub async fn preview_file(
    State(service): State<GatewayService>,
    Path(file_path): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let preview = service.preview_file(trim_route_slash(&file_path)).await?;
    Ok(Json(preview))
}

/// GET `/files/raw/{*key}?expires=..&token=..` — download through a
/// locally-signed URL, streaming the object body.
///
/// Live only when the gateway signs its own URLs (local backend); against
/// S3 the provider signs, nothing points here, and every key is a 404. A
/// missing, invalid or expired signature is refused with 403, the same
/// answer a provider gives for a stale signed URL.
pub async fn download_signed(
    State(service): State<GatewayService>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let (Some(expires), Some(token)) = (query.expires, query.token) else {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "signed URL is invalid or expired",
        ));
    };
    let (meta, reader) = service.open_signed(&key, expires, &token).await?;

    let stream = ReaderStream::new(reader);
    let mut response = Response::new(Body::from_stream(stream));
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// Client URLs carry a trailing slash; axum's wildcard swallows it into the
/// capture, so handlers peel it back off before treating the rest as a key.
fn trim_route_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMeta) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref() {
        let quoted = format!("\"{etag}\"");
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }

    headers.insert(
        header::LAST_MODIFIED,
        HeaderValue::from_str(&meta.updated.to_rfc2822())
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );
}
