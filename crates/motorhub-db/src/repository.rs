use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use motorhub_types::{
    BlockRelation, ContentHash, FileRecord, LocalDownloadRecord, Message, MessageId,
    MessageStatus, ModerationReport, Participant, ThreadKey,
};

use crate::Database;

pub type MessageRepositoryRef = Arc<dyn MessageRepository>;
pub type FileRecordRepositoryRef = Arc<dyn FileRecordRepository>;
pub type BlockRepositoryRef = Arc<dyn BlockRepository>;
pub type ReportRepositoryRef = Arc<dyn ReportRepository>;
pub type DownloadLedgerRef = Arc<dyn DownloadLedger>;

/// Per-thread message tree.
#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, thread: &ThreadKey, message: &Message) -> Result<()>;
    async fn get(&self, id: MessageId) -> Result<Option<Message>>;
    async fn list_thread(&self, thread: &ThreadKey) -> Result<Vec<Message>>;
    async fn count_thread(&self, thread: &ThreadKey) -> Result<u64>;
    /// Returns the updated message, or `None` if the stored status did not
    /// permit the transition.
    async fn advance_status(&self, id: MessageId, next: MessageStatus) -> Result<Option<Message>>;
    /// Returns the updated message, or `None` if nothing changed.
    async fn add_deleted_for(&self, id: MessageId, participant: &Participant) -> Result<Option<Message>>;
}

#[async_trait::async_trait]
pub trait FileRecordRepository: Send + Sync {
    async fn get(&self, hash: &ContentHash) -> Result<Option<FileRecord>>;
    /// Returns true when this call created the record.
    async fn insert_if_absent(&self, record: &FileRecord) -> Result<bool>;
    async fn add_reference(&self, hash: &ContentHash, participant: &Participant) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait BlockRepository: Send + Sync {
    async fn is_blocked(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool>;
    async fn insert(&self, relation: &BlockRelation) -> Result<bool>;
    async fn remove(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool>;
    async fn list_blocked(&self, blocker: &Participant, car_id: &str) -> Result<Vec<BlockRelation>>;
}

#[async_trait::async_trait]
pub trait ReportRepository: Send + Sync {
    async fn insert(&self, report: &ModerationReport) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<ModerationReport>>;
    async fn list(&self) -> Result<Vec<ModerationReport>>;
    async fn mark_revised(&self, id: Uuid) -> Result<bool>;
}

/// Device-local record of which blobs are cached on disk.
#[async_trait::async_trait]
pub trait DownloadLedger: Send + Sync {
    async fn get(&self, hash: &ContentHash) -> Result<Option<LocalDownloadRecord>>;
    async fn upsert(&self, record: &LocalDownloadRecord) -> Result<()>;
    async fn delete(&self, hash: &ContentHash) -> Result<bool>;
    async fn list(&self) -> Result<Vec<LocalDownloadRecord>>;
}

#[async_trait::async_trait]
impl MessageRepository for Database {
    async fn insert(&self, thread: &ThreadKey, message: &Message) -> Result<()> {
        self.insert_message(thread, message)
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        self.get_message(id)
    }

    async fn list_thread(&self, thread: &ThreadKey) -> Result<Vec<Message>> {
        self.list_thread_messages(thread)
    }

    async fn count_thread(&self, thread: &ThreadKey) -> Result<u64> {
        self.count_thread_messages(thread)
    }

    async fn advance_status(&self, id: MessageId, next: MessageStatus) -> Result<Option<Message>> {
        self.advance_message_status(id, next)
    }

    async fn add_deleted_for(&self, id: MessageId, participant: &Participant) -> Result<Option<Message>> {
        self.add_message_deletion(id, participant)
    }
}

#[async_trait::async_trait]
impl FileRecordRepository for Database {
    async fn get(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        self.get_file_record(hash)
    }

    async fn insert_if_absent(&self, record: &FileRecord) -> Result<bool> {
        self.insert_file_record(record)
    }

    async fn add_reference(&self, hash: &ContentHash, participant: &Participant) -> Result<bool> {
        self.add_file_reference(hash, participant)
    }
}

#[async_trait::async_trait]
impl BlockRepository for Database {
    async fn is_blocked(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool> {
        Database::is_blocked(self, blocker, blocked, car_id)
    }

    async fn insert(&self, relation: &BlockRelation) -> Result<bool> {
        self.insert_block(relation)
    }

    async fn remove(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool> {
        self.remove_block(blocker, blocked, car_id)
    }

    async fn list_blocked(&self, blocker: &Participant, car_id: &str) -> Result<Vec<BlockRelation>> {
        self.list_blocks(blocker, car_id)
    }
}

#[async_trait::async_trait]
impl ReportRepository for Database {
    async fn insert(&self, report: &ModerationReport) -> Result<()> {
        self.insert_report(report)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ModerationReport>> {
        self.get_report(id)
    }

    async fn list(&self) -> Result<Vec<ModerationReport>> {
        self.list_reports()
    }

    async fn mark_revised(&self, id: Uuid) -> Result<bool> {
        self.mark_report_revised(id)
    }
}

#[async_trait::async_trait]
impl DownloadLedger for Database {
    async fn get(&self, hash: &ContentHash) -> Result<Option<LocalDownloadRecord>> {
        self.get_download(hash)
    }

    async fn upsert(&self, record: &LocalDownloadRecord) -> Result<()> {
        self.upsert_download(record)
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool> {
        self.delete_download(hash)
    }

    async fn list(&self) -> Result<Vec<LocalDownloadRecord>> {
        self.list_downloads()
    }
}
