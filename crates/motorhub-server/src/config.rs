use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Per-device download ledger, kept apart from the shared store.
    pub device_db_path: PathBuf,
    pub blob_dir: PathBuf,
    pub blob_base_url: String,
    pub media_dir: PathBuf,
    pub jwt_secret: String,
    pub reconcile_secs: u64,
    pub channel_capacity: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("MOTORHUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MOTORHUB_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let host = var("MOTORHUB_HOST", "0.0.0.0");
        let port = var("MOTORHUB_PORT", "3000")
            .parse()
            .context("MOTORHUB_PORT must be a port number")?;
        let reconcile_secs = var("MOTORHUB_RECONCILE_SECS", "900")
            .parse()
            .context("MOTORHUB_RECONCILE_SECS must be a number of seconds")?;
        let channel_capacity = var("MOTORHUB_CHANNEL_CAPACITY", "1024")
            .parse()
            .context("MOTORHUB_CHANNEL_CAPACITY must be a positive integer")?;
        if channel_capacity == 0 {
            bail!("MOTORHUB_CHANNEL_CAPACITY must be a positive integer");
        }
        let max_upload_bytes = lookup("MOTORHUB_MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(64 * 1024 * 1024);

        Ok(Self {
            host,
            port,
            db_path: var("MOTORHUB_DB_PATH", "motorhub.db").into(),
            device_db_path: var("MOTORHUB_DEVICE_DB_PATH", "motorhub-device.db").into(),
            blob_dir: var("MOTORHUB_BLOB_DIR", "./blob-storage").into(),
            blob_base_url: var("MOTORHUB_BLOB_BASE_URL", "http://localhost:3000/blobs"),
            media_dir: var("MOTORHUB_MEDIA_DIR", "./media").into(),
            jwt_secret,
            reconcile_secs,
            channel_capacity,
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
