#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use bytes::Bytes;
use uuid::Uuid;

use motorhub_chat::{BlockingPolicy, ChatCoordinator, ChatStats, ModerationReportBuilder, Notifier};
use motorhub_db::{Database, MessageRepository, ReportRepository};
use motorhub_files::{BlobStore, FileDedupStore, FsBlobStore, LocalFileCache};
use motorhub_gateway::{Dispatcher, MessageChannel};
use motorhub_types::{Message, MessageId, MessageStatus, ModerationReport, Participant, ThreadKey};

/// Message store whose inserts can be made to fail on demand.
pub struct FlakyMessages {
    pub inner: Arc<Database>,
    pub fail_inserts: AtomicBool,
}

#[async_trait::async_trait]
impl MessageRepository for FlakyMessages {
    async fn insert(&self, thread: &ThreadKey, message: &Message) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            bail!("simulated network failure");
        }
        MessageRepository::insert(self.inner.as_ref(), thread, message).await
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        MessageRepository::get(self.inner.as_ref(), id).await
    }

    async fn list_thread(&self, thread: &ThreadKey) -> Result<Vec<Message>> {
        self.inner.list_thread(thread).await
    }

    async fn count_thread(&self, thread: &ThreadKey) -> Result<u64> {
        self.inner.count_thread(thread).await
    }

    async fn advance_status(&self, id: MessageId, next: MessageStatus) -> Result<Option<Message>> {
        self.inner.advance_status(id, next).await
    }

    async fn add_deleted_for(&self, id: MessageId, participant: &Participant) -> Result<Option<Message>> {
        self.inner.add_deleted_for(id, participant).await
    }
}

/// Blob store whose uploads can be made to fail on demand.
pub struct FlakyBlobs {
    pub inner: FsBlobStore,
    pub fail_puts: AtomicBool,
}

#[async_trait::async_trait]
impl BlobStore for FlakyBlobs {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("simulated upload timeout");
        }
        self.inner.put(path, bytes).await
    }

    async fn get(&self, url: &str) -> Result<Bytes> {
        self.inner.get(url).await
    }
}

/// Report store that always fails to write.
pub struct BrokenReports;

#[async_trait::async_trait]
impl ReportRepository for BrokenReports {
    async fn insert(&self, _report: &ModerationReport) -> Result<()> {
        bail!("disk full")
    }

    async fn get(&self, _id: Uuid) -> Result<Option<ModerationReport>> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<ModerationReport>> {
        Ok(Vec::new())
    }

    async fn mark_revised(&self, _id: Uuid) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Participant, String)>>,
}

impl RecordingNotifier {
    pub fn titles_for(&self, user: &Participant) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user: &Participant, title: &str, _body: &str) {
        self.sent.lock().unwrap().push((user.clone(), title.to_string()));
    }
}

pub struct Harness {
    pub root: PathBuf,
    pub db: Arc<Database>,
    pub messages: Arc<FlakyMessages>,
    pub blobs: Arc<FlakyBlobs>,
    pub channel: MessageChannel,
    pub files: Arc<FileDedupStore>,
    pub coordinator: ChatCoordinator,
    pub reports: ModerationReportBuilder,
    pub notifier: Arc<RecordingNotifier>,
    pub stats: Arc<ChatStats>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_report_repo(reports: Arc<dyn ReportRepository>) -> Self {
        Self::build(Some(reports)).await
    }

    async fn build(reports: Option<Arc<dyn ReportRepository>>) -> Self {
        let root = std::env::temp_dir().join(format!("motorhub-chat-{}", Uuid::new_v4()));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let device_db = Arc::new(Database::open_in_memory().unwrap());

        let messages = Arc::new(FlakyMessages {
            inner: db.clone(),
            fail_inserts: AtomicBool::new(false),
        });
        let channel = MessageChannel::new(messages.clone(), Dispatcher::new());

        let blobs = Arc::new(FlakyBlobs {
            inner: FsBlobStore::new(root.join("blobs"), "file:///blobs").await.unwrap(),
            fail_puts: AtomicBool::new(false),
        });
        let files = Arc::new(FileDedupStore::new(db.clone(), blobs.clone()));
        let cache = Arc::new(LocalFileCache::new(files.clone(), device_db, root.join("media")));

        let notifier = Arc::new(RecordingNotifier::default());
        let stats = Arc::new(ChatStats::new());
        let coordinator = ChatCoordinator::new(
            channel.clone(),
            BlockingPolicy::new(db.clone()),
            files.clone(),
            cache,
            notifier.clone(),
            stats.clone(),
        );

        let report_repo: Arc<dyn ReportRepository> = reports.unwrap_or_else(|| db.clone() as Arc<dyn ReportRepository>);
        let reports = ModerationReportBuilder::new(Arc::new(channel.clone()), report_repo, stats.clone());

        Self {
            root,
            db,
            messages,
            blobs,
            channel,
            files,
            coordinator,
            reports,
            notifier,
            stats,
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.messages.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.blobs.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.root).await;
    }
}
