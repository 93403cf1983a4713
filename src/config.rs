use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

/// Which storage backend the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Local directory store, for development and tests.
    Local,
    /// Any S3-compatible endpoint (AWS, MinIO, GCS interop).
    S3,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => anyhow::bail!("unknown backend `{other}` (expected `local` or `s3`)"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub bucket: Option<String>,
    pub region: String,
    pub endpoint: Option<String>,
    pub data_dir: String,
    pub public_url: String,
    pub signing_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_upload_mb: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Folder/file CRUD gateway over an object-storage bucket")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend, `local` or `s3` (overrides BUCKET_GATEWAY_BACKEND)
    #[arg(long)]
    pub backend: Option<String>,

    /// Bucket name, required for the s3 backend (overrides BUCKET_GATEWAY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3 region (overrides BUCKET_GATEWAY_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint for MinIO/GCS interop (overrides BUCKET_GATEWAY_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Directory where the local backend stores objects (overrides BUCKET_GATEWAY_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Externally reachable base URL for locally-signed links (overrides BUCKET_GATEWAY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Secret for signing local download URLs (overrides BUCKET_GATEWAY_SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Backend operation timeout in seconds (overrides BUCKET_GATEWAY_TIMEOUT_SECS)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Upload body cap in MiB (overrides BUCKET_GATEWAY_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("BUCKET_GATEWAY_HOST").ok();
        let env_port: Option<u16> = parse_env("BUCKET_GATEWAY_PORT")?;
        let env_backend = env::var("BUCKET_GATEWAY_BACKEND").ok();
        let env_bucket = env::var("BUCKET_GATEWAY_BUCKET").ok();
        let env_region = env::var("BUCKET_GATEWAY_REGION").ok();
        let env_endpoint = env::var("BUCKET_GATEWAY_ENDPOINT").ok();
        let env_data_dir = env::var("BUCKET_GATEWAY_DATA_DIR").ok();
        let env_public_url = env::var("BUCKET_GATEWAY_PUBLIC_URL").ok();
        let env_secret = env::var("BUCKET_GATEWAY_SIGNING_SECRET").ok();
        let env_timeout: Option<u64> = parse_env("BUCKET_GATEWAY_TIMEOUT_SECS")?;
        let env_upload: Option<usize> = parse_env("BUCKET_GATEWAY_MAX_UPLOAD_MB")?;

        // --- Merge: CLI wins over environment, environment over defaults ---
        let port = args.port.or(env_port).unwrap_or(8000);
        let backend = args
            .backend
            .or(env_backend)
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(Backend::Local);
        let public_url = args
            .public_url
            .or(env_public_url)
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        Ok(Self {
            host: args.host.or(env_host).unwrap_or_else(|| "0.0.0.0".into()),
            port,
            backend,
            bucket: args.bucket.or(env_bucket),
            region: args
                .region
                .or(env_region)
                .unwrap_or_else(|| "us-east-1".into()),
            endpoint: args.endpoint.or(env_endpoint),
            data_dir: args
                .data_dir
                .or(env_data_dir)
                .unwrap_or_else(|| "./data/objects".into()),
            public_url,
            signing_secret: args.signing_secret.or(env_secret),
            timeout_secs: args.timeout_secs.or(env_timeout).unwrap_or(30),
            max_upload_mb: args.max_upload_mb.or(env_upload).unwrap_or(100),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Operation timeout applied to every backend call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upload cap as a byte count, for the request body limit. Saturates so
    /// an absurd flag value pins the cap at the type's maximum instead of
    /// overflowing.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// The signing secret never reaches the logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("data_dir", &self.data_dir)
            .field("public_url", &self.public_url)
            .field(
                "signing_secret",
                &self.signing_secret.as_deref().map(|_| "<redacted>"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("max_upload_mb", &self.max_upload_mb)
            .finish()
    }
}

/// Read an environment variable and parse it, erroring out on a value that
/// is present but malformed.
fn parse_env<T>(name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {name} value `{value}`")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}
