//! Defines routes for all folder and file operations.
//!
//! ## Structure
//! - **Folder endpoints**
//!   - `GET    /folders/` — list folder names (distinct first key segments)
//!   - `POST   /folders/create/` — create a folder (writes its `.keep` marker)
//!   - `DELETE /folders/{folder_name}/` — delete every object under the prefix
//!
//! - **File endpoints**
//!   - `GET    /files/{prefix}/` — list files whose key starts with the prefix
//!   - `POST   /files/upload/{folder}/` — multipart upload, field name `file`
//!   - `DELETE /files/delete/{*file_path}` — delete one object
//!   - `GET    /files/preview/{*file_path}` — inline text or a signed URL
//!   - `GET    /files/raw/{*key}` — locally-signed download (local backend only)
//!
//! The wildcard `{*file_path}` allows nested keys like `docs/2025/report.pdf`
//! and swallows the trailing slash client URLs carry; handlers trim it back
//! off. Static segments (`upload`, `delete`, `preview`, `raw`) win over the
//! `{prefix}` capture, so the listing route only sees real prefixes.

use crate::{
    handlers::{
        file_handlers::{delete_file, download_signed, list_files, preview_file, upload_file},
        folder_handlers::{create_folder, delete_folder, list_folders},
        health_handlers::{healthz, readyz},
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`GatewayService`) to all handlers.
pub fn routes() -> Router<GatewayService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Folder-level routes
        .route("/folders/", get(list_folders))
        .route("/folders/create/", post(create_folder))
        .route("/folders/{folder_name}/", delete(delete_folder))
        // File-level routes
        .route("/files/upload/{folder}/", post(upload_file))
        .route("/files/delete/{*file_path}", delete(delete_file))
        .route("/files/preview/{*file_path}", get(preview_file))
        .route("/files/raw/{*key}", get(download_signed))
        .route("/files/{prefix}/", get(list_files))
}
