use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use motorhub_db::{Database, DownloadLedger, MessageRepository, ReportRepository};
use motorhub_types::{
    CarId, ContentHash, DownloadSource, LocalDownloadRecord, Message, MessageId, MessageStatus,
    ModerationReport, Participant, ThreadKey,
};

fn temp_db_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("motorhub-db-{}-{}", name, Uuid::new_v4()))
        .join("motorhub.db")
}

fn message(thread: &ThreadKey, from: Participant, to: Participant, body: &str) -> Message {
    Message {
        id: MessageId::new(),
        sender_id: from,
        receiver_id: to,
        content: Some(body.to_string()),
        attachment: None,
        timestamp: Utc::now(),
        status: MessageStatus::Sent,
        car_id: thread.car_id.clone(),
        deleted_for: BTreeSet::new(),
    }
}

#[tokio::test]
async fn test_messages_survive_reopen() {
    let path = temp_db_path("reopen");
    let thread = ThreadKey::direct("seller", "car42", "buyer").unwrap();
    let sent = message(&thread, Participant::user("buyer"), Participant::user("seller"), "still there?");

    {
        let db = Database::open(&path).unwrap();
        MessageRepository::insert(&db, &thread, &sent).await.unwrap();
    }

    let db = Database::open(&path).unwrap();
    let listed = db.list_thread(&thread).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, sent.id);
    assert_eq!(db.count_thread(&thread).await.unwrap(), 1);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_report_keeps_its_sample_and_only_flips_revised() {
    let db: Arc<dyn ReportRepository> = Arc::new(Database::open_in_memory().unwrap());
    let thread = ThreadKey::direct("seller", "car42", "buyer").unwrap();
    let sample = vec![message(&thread, Participant::user("seller"), Participant::user("buyer"), "rude")];

    let report = ModerationReport {
        id: Uuid::new_v4(),
        reporter_id: Participant::user("buyer"),
        reported_user_id: Participant::user("seller"),
        car_id: CarId::new("car42"),
        owner: thread.owner.clone(),
        thread: thread.clone(),
        timestamp: Utc::now(),
        comment: Some("abusive".into()),
        messages: sample.clone(),
        revised: false,
    };
    db.insert(&report).await.unwrap();

    assert!(db.mark_revised(report.id).await.unwrap());
    assert!(!db.mark_revised(Uuid::new_v4()).await.unwrap());

    let stored = db.get(report.id).await.unwrap().unwrap();
    assert!(stored.revised);
    assert_eq!(stored.comment.as_deref(), Some("abusive"));
    assert_eq!(stored.messages[0].id, sample[0].id);
    assert_eq!(stored.thread, thread);
    assert_eq!(db.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_download_ledger_upsert_and_delete() {
    let db: Arc<dyn DownloadLedger> = Arc::new(Database::open_in_memory().unwrap());
    let hash: ContentHash = "ab".repeat(32).parse().unwrap();

    let mut record = LocalDownloadRecord {
        hash: hash.clone(),
        file_name: "photo.jpg".into(),
        local_path: PathBuf::from("/tmp/media/images/photo.jpg"),
        mime_type: "image/jpeg".into(),
        source: DownloadSource::Downloaded,
    };
    db.upsert(&record).await.unwrap();

    record.source = DownloadSource::Uploaded;
    db.upsert(&record).await.unwrap();

    let stored = db.get(&hash).await.unwrap().unwrap();
    assert_eq!(stored.source, DownloadSource::Uploaded);
    assert_eq!(db.list().await.unwrap().len(), 1);

    assert!(db.delete(&hash).await.unwrap());
    assert!(!db.delete(&hash).await.unwrap());
    assert!(db.get(&hash).await.unwrap().is_none());
}
