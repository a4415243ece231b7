use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use motorhub_db::DownloadLedgerRef;
use motorhub_types::{ContentHash, DownloadSource, LocalDownloadRecord};

use crate::dedup::FileDedupStore;
use crate::error::FileError;
use crate::hash;
use crate::stats::FileStats;

/// Outcome of one reconcile sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// Per-device cache of attachment bytes, keyed by content hash.
///
/// Files live under `{media_dir}/{category}/`. The ledger only ever points
/// at files that existed when the row was written; `reconcile` drops rows
/// whose file has since disappeared.
pub struct LocalFileCache {
    store: Arc<FileDedupStore>,
    ledger: DownloadLedgerRef,
    media_dir: PathBuf,
}

impl LocalFileCache {
    pub fn new(store: Arc<FileDedupStore>, ledger: DownloadLedgerRef, media_dir: PathBuf) -> Self {
        Self {
            store,
            ledger,
            media_dir,
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    fn stats(&self) -> &FileStats {
        self.store.stats()
    }

    /// Ledger entry for `hash`, if its file is still on disk. A row whose
    /// file is gone is dropped on the spot; a row that cannot be checked is
    /// kept and reported as a miss.
    pub async fn lookup(&self, hash: &ContentHash) -> Result<Option<LocalDownloadRecord>, FileError> {
        let Some(record) = self.ledger.get(hash).await? else {
            return Ok(None);
        };

        match fs::try_exists(&record.local_path).await {
            Ok(true) => Ok(Some(record)),
            Ok(false) => {
                debug!(hash = %hash, path = %record.local_path.display(), "Cached file vanished, dropping ledger row");
                self.ledger.delete(hash).await?;
                Ok(None)
            }
            Err(e) => {
                warn!(hash = %hash, path = %record.local_path.display(), "Cannot stat cached file: {}", e);
                Ok(None)
            }
        }
    }

    /// Local path for `hash`, downloading it on a miss.
    pub async fn resolve(&self, hash: &ContentHash, file_name: &str) -> Result<PathBuf, FileError> {
        if let Some(cached) = self.lookup(hash).await? {
            return Ok(cached.local_path);
        }

        let record = self
            .store
            .lookup(hash)
            .await?
            .ok_or_else(|| FileError::NotFound { hash: hash.to_string() })?;
        let bytes = self.store.fetch(&record).await?;

        let dir = self.media_dir.join(record.category.as_str());
        fs::create_dir_all(&dir).await?;
        let path = dir.join(local_file_name(hash, file_name));

        // Concurrent resolves of one hash write identical bytes to the same path
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.ledger
            .upsert(&LocalDownloadRecord {
                hash: hash.clone(),
                file_name: file_name.to_string(),
                local_path: path.clone(),
                mime_type: record.mime_type.clone(),
                source: DownloadSource::Downloaded,
            })
            .await?;

        info!(hash = %hash, path = %path.display(), "Attachment cached locally");
        Ok(path)
    }

    /// Register the sender's own copy of a file it just uploaded, so opening
    /// its own message never downloads the bytes back.
    pub async fn record_upload(
        &self,
        hash: &ContentHash,
        file_name: &str,
        local_path: &Path,
        mime_type: &str,
    ) -> Result<LocalDownloadRecord, FileError> {
        let actual = hash::hash_file(local_path).await?;
        if actual != hash.as_str() {
            return Err(FileError::HashMismatch {
                expected: hash.to_string(),
                actual,
            });
        }

        let record = LocalDownloadRecord {
            hash: hash.clone(),
            file_name: file_name.to_string(),
            local_path: local_path.to_path_buf(),
            mime_type: mime_type.to_string(),
            source: DownloadSource::Uploaded,
        };
        self.ledger.upsert(&record).await?;
        Ok(record)
    }

    /// Drop every ledger row whose file no longer exists. Never downloads
    /// anything; a row that cannot be checked or deleted is skipped.
    pub async fn reconcile(&self) -> Result<ReconcileReport, FileError> {
        let records = self.ledger.list().await?;
        let mut report = ReconcileReport {
            checked: records.len(),
            ..Default::default()
        };

        for record in records {
            match fs::try_exists(&record.local_path).await {
                Ok(true) => {}
                Ok(false) => match self.ledger.delete(&record.hash).await {
                    Ok(_) => {
                        report.removed += 1;
                        FileStats::bump(&self.stats().reconcile_removed);
                    }
                    Err(e) => {
                        warn!(hash = %record.hash, "Reconcile: failed to drop stale row: {}", e);
                        report.skipped += 1;
                        FileStats::bump(&self.stats().reconcile_skipped);
                    }
                },
                Err(e) => {
                    warn!(hash = %record.hash, path = %record.local_path.display(), "Reconcile: cannot stat file: {}", e);
                    report.skipped += 1;
                    FileStats::bump(&self.stats().reconcile_skipped);
                }
            }
        }

        Ok(report)
    }
}

/// `{hash[..16]}_{name}`, with any directory part of `file_name` stripped.
fn local_file_name(hash: &ContentHash, file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("file");
    format!("{}_{}", &hash.as_str()[..16], name)
}
