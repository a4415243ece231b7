//! Database row types. These map directly to SQLite rows.
//! Distinct from motorhub-types models to keep the DB layer's encoding local.
use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use motorhub_types::{
    Attachment, BlockRelation, CarId, ContentHash, FileRecord, LocalDownloadRecord, Message,
    ModerationReport, Participant,
};

pub struct MessageRow {
    pub id: String,
    pub thread: String,
    pub car_id: String,
    pub sender: String,
    pub receiver: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_mime: Option<String>,
    pub file_category: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
    pub timestamp_ms: i64,
    pub status: String,
}

impl MessageRow {
    pub fn into_message(self, deleted_for: BTreeSet<Participant>) -> Result<Message> {
        let attachment = match self.file_hash {
            Some(hash) => Some(Attachment {
                file_url: self.file_url,
                mime_type: self.file_mime.unwrap_or_default(),
                category: self
                    .file_category
                    .as_deref()
                    .unwrap_or("documents")
                    .parse()?,
                file_name: self.file_name.unwrap_or_default(),
                file_size: self.file_size.unwrap_or(0).max(0) as u64,
                hash: hash.parse()?,
            }),
            None => None,
        };

        Ok(Message {
            id: self
                .id
                .parse()
                .with_context(|| format!("Corrupt message id '{}'", self.id))?,
            sender_id: self.sender.parse()?,
            receiver_id: self.receiver.parse()?,
            content: self.content,
            attachment,
            timestamp: from_millis(self.timestamp_ms)?,
            status: self.status.parse()?,
            car_id: CarId::new(self.car_id),
            deleted_for,
        })
    }
}

pub struct FileRecordRow {
    pub hash: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub category: String,
    pub created_at_ms: i64,
}

impl FileRecordRow {
    pub fn into_record(self, referencing_users: BTreeSet<Participant>) -> Result<FileRecord> {
        Ok(FileRecord {
            hash: self.hash.parse()?,
            url: self.url,
            size: self.size.max(0) as u64,
            mime_type: self.mime_type,
            category: self.category.parse()?,
            referencing_users,
            created_at: from_millis(self.created_at_ms)?,
        })
    }
}

pub struct BlockRow {
    pub blocker: String,
    pub blocked: String,
    pub car_id: String,
    pub created_at_ms: i64,
}

impl TryFrom<BlockRow> for BlockRelation {
    type Error = anyhow::Error;

    fn try_from(row: BlockRow) -> Result<Self> {
        Ok(BlockRelation {
            blocker: row.blocker.parse()?,
            blocked: row.blocked.parse()?,
            car_id: CarId::new(row.car_id),
            created_at: from_millis(row.created_at_ms)?,
        })
    }
}

pub struct ReportRow {
    pub id: String,
    pub reporter: String,
    pub reported: String,
    pub car_id: String,
    pub owner: String,
    pub thread: String,
    pub timestamp_ms: i64,
    pub comment: Option<String>,
    pub messages_json: String,
    pub revised: bool,
}

impl TryFrom<ReportRow> for ModerationReport {
    type Error = anyhow::Error;

    fn try_from(row: ReportRow) -> Result<Self> {
        let messages: Vec<Message> = serde_json::from_str(&row.messages_json)
            .with_context(|| format!("Corrupt message sample on report '{}'", row.id))?;
        Ok(ModerationReport {
            id: row.id.parse()?,
            reporter_id: row.reporter.parse()?,
            reported_user_id: row.reported.parse()?,
            car_id: CarId::new(row.car_id),
            owner: row.owner.parse()?,
            thread: row.thread.parse()?,
            timestamp: from_millis(row.timestamp_ms)?,
            comment: row.comment,
            messages,
            revised: row.revised,
        })
    }
}

pub struct DownloadRow {
    pub hash: String,
    pub file_name: String,
    pub local_path: String,
    pub mime_type: String,
    pub source: String,
}

impl TryFrom<DownloadRow> for LocalDownloadRecord {
    type Error = anyhow::Error;

    fn try_from(row: DownloadRow) -> Result<Self> {
        Ok(LocalDownloadRecord {
            hash: row.hash.parse::<ContentHash>()?,
            file_name: row.file_name,
            local_path: PathBuf::from(row.local_path),
            mime_type: row.mime_type,
            source: row.source.parse()?,
        })
    }
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {}", ms))
}
