//! HTTP handlers for folder operations.
//!
//! A folder is never an entity here: listing computes distinct key prefixes,
//! creation writes the `.keep` marker, deletion sweeps the prefix. These
//! handlers only shape the gateway's answers into the JSON the client
//! expects.

use crate::{
    errors::AppError,
    models::folder::{CreateFolderRequest, CreateFolderResponse},
    services::gateway_service::GatewayService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET `/folders/` — JSON array of folder names, sorted ascending.
pub async fn list_folders(
    State(service): State<GatewayService>,
) -> Result<impl IntoResponse, AppError> {
    let folders = service.list_folders().await?;
    Ok(Json(folders))
}

/// POST `/folders/create/` — body `{"folder_name": ...}`.
///
/// Replies 201 with `{"folder": name}`; a missing or empty name is a 400.
pub async fn create_folder(
    State(service): State<GatewayService>,
    Json(payload): Json<CreateFolderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Some(name) = payload.folder_name.filter(|name| !name.is_empty()) else {
        return Err(AppError::bad_request("folder_name is required"));
    };

    let folder = service.create_folder(&name).await?;
    Ok((StatusCode::CREATED, Json(CreateFolderResponse { folder })))
}

/// DELETE `/folders/{folder_name}/` — remove every object under the prefix.
pub async fn delete_folder(
    State(service): State<GatewayService>,
    Path(folder_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_folder(&folder_name).await?;
    Ok(StatusCode::NO_CONTENT)
}
