use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info};

use motorhub_db::FileRecordRepositoryRef;
use motorhub_types::{ContentHash, FileCategory, FileRecord, Participant};

use crate::blob::BlobStoreRef;
use crate::error::FileError;
use crate::hash;
use crate::stats::FileStats;

/// Content-addressed attachment store. One blob and one record per distinct
/// hash, no matter how many messages or threads share it.
#[derive(Clone)]
pub struct FileDedupStore {
    records: FileRecordRepositoryRef,
    blobs: BlobStoreRef,
    stats: Arc<FileStats>,
}

impl FileDedupStore {
    pub fn new(records: FileRecordRepositoryRef, blobs: BlobStoreRef) -> Self {
        Self {
            records,
            blobs,
            stats: Arc::new(FileStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<FileStats> {
        &self.stats
    }

    /// `{category}/{hash[0..2]}/{hash}`
    pub fn blob_path(hash: &ContentHash, category: FileCategory) -> String {
        format!("{}/{}/{}", category.as_str(), hash.shard(), hash)
    }

    /// Store an attachment, or reuse the stored copy if this content was seen before.
    pub async fn put(
        &self,
        hash: &ContentHash,
        bytes: Bytes,
        mime_type: &str,
        category: FileCategory,
        uploader: &Participant,
    ) -> Result<FileRecord, FileError> {
        hash::verify(hash, &bytes)?;

        if let Some(mut existing) = self.records.get(hash).await? {
            if self.records.add_reference(hash, uploader).await? {
                existing.referencing_users.insert(uploader.clone());
            }
            FileStats::bump(&self.stats.dedup_hits);
            debug!(hash = %hash, uploader = %uploader, "Dedup hit, reusing stored blob");
            return Ok(existing);
        }

        let size = bytes.len() as u64;
        let url = self.blobs.put(&Self::blob_path(hash, category), bytes).await?;
        FileStats::bump(&self.stats.uploads);

        let record = FileRecord {
            hash: hash.clone(),
            url,
            size,
            mime_type: mime_type.to_string(),
            category,
            referencing_users: BTreeSet::from([uploader.clone()]),
            created_at: Utc::now(),
        };

        if self.records.insert_if_absent(&record).await? {
            info!(hash = %hash, size, category = category.as_str(), "Stored new file");
            return Ok(record);
        }

        // Lost a race with an identical upload; its record wins and already has us unioned in
        debug!(hash = %hash, "Concurrent upload created the record first");
        self.records
            .get(hash)
            .await?
            .ok_or_else(|| FileError::NotFound { hash: hash.to_string() })
    }

    pub async fn lookup(&self, hash: &ContentHash) -> Result<Option<FileRecord>, FileError> {
        Ok(self.records.get(hash).await?)
    }

    /// Union `participant` into the record's referencing users.
    pub async fn add_reference(
        &self,
        hash: &ContentHash,
        participant: &Participant,
    ) -> Result<FileRecord, FileError> {
        let mut record = self
            .records
            .get(hash)
            .await?
            .ok_or_else(|| FileError::NotFound { hash: hash.to_string() })?;

        if self.records.add_reference(hash, participant).await? {
            record.referencing_users.insert(participant.clone());
        }
        Ok(record)
    }

    /// Download a stored blob and check it still matches its hash.
    pub async fn fetch(&self, record: &FileRecord) -> Result<Bytes, FileError> {
        let bytes = self.blobs.get(&record.url).await.map_err(|e| {
            let missing = e
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
            if missing {
                FileError::NotFound { hash: record.hash.to_string() }
            } else {
                FileError::Transport(e)
            }
        })?;
        hash::verify(&record.hash, &bytes)?;
        FileStats::bump(&self.stats.downloads);
        Ok(bytes)
    }
}
