use anyhow::{Context, Result};
use axum::{Router, extract::DefaultBodyLimit};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use bucket_gateway::{
    config::{self, Backend},
    routes,
    services::gateway_service::GatewayService,
    store::{fs::FsObjectStore, s3::S3ObjectStore, signer::UrlSigner},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting bucket-gateway with config: {:?}", cfg);

    // --- Initialize core service ---
    let service = match cfg.backend {
        Backend::Local => {
            // Ensure the data directory exists before the first request.
            if !Path::new(&cfg.data_dir).exists() {
                fs::create_dir_all(&cfg.data_dir)?;
                tracing::info!("Created data directory at {}", cfg.data_dir);
            }

            let secret = match cfg.signing_secret.clone() {
                Some(secret) => secret,
                None => {
                    tracing::warn!(
                        "No signing secret configured; signed URLs will not survive a restart"
                    );
                    Uuid::new_v4().simple().to_string()
                }
            };
            let signer = UrlSigner::new(secret, cfg.public_url.clone());
            let store = FsObjectStore::new(&cfg.data_dir, signer.clone());
            GatewayService::new(Arc::new(store), Some(signer))
        }
        Backend::S3 => {
            let bucket = cfg
                .bucket
                .clone()
                .context("--bucket (or BUCKET_GATEWAY_BUCKET) is required for the s3 backend")?;
            let store = S3ObjectStore::connect(
                bucket,
                cfg.region.clone(),
                cfg.endpoint.clone(),
                cfg.timeout(),
            )
            .await;
            // The provider signs its own URLs; the raw route stays inert.
            GatewayService::new(Arc::new(store), None)
        }
    };

    // --- Build router ---
    let app: Router = routes::routes::routes()
        .with_state(service)
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
