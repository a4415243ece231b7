use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Durable blob storage addressed by relative path on write and URL on read.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return the URL it can be fetched from.
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String>;
    async fn get(&self, url: &str) -> Result<Bytes>;
}

pub type BlobStoreRef = Arc<dyn BlobStore>;

/// Directory-backed blob store. URLs are `{base_url}/{path}`.
pub struct FsBlobStore {
    dir: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    pub async fn new(dir: PathBuf, base_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url, relative)
    }

    /// Map a relative blob path onto the storage dir, refusing anything that
    /// could escape it.
    fn file_path(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("Invalid blob path '{}'", relative);
        }
        Ok(self.dir.join(rel))
    }

    fn relative_from_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        url.strip_prefix(self.base_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| anyhow::anyhow!("URL '{}' is not served by this blob store", url))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String> {
        let target = self.file_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial blob
        let tmp = target.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Stored blob {} ({} bytes)", path, bytes.len());
        Ok(self.url_for(path))
    }

    async fn get(&self, url: &str) -> Result<Bytes> {
        let relative = self.relative_from_url(url)?;
        let path = self.file_path(relative)?;
        let data = fs::read(&path).await?;
        Ok(Bytes::from(data))
    }
}
