use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use uuid::Uuid;

use motorhub_db::{Database, DownloadLedger};
use motorhub_files::{FileDedupStore, FileError, FsBlobStore, LocalFileCache, content_hash};
use motorhub_types::{DownloadSource, FileCategory, LocalDownloadRecord, Participant};

struct Fixture {
    root: PathBuf,
    store: Arc<FileDedupStore>,
    ledger: Arc<Database>,
    cache: LocalFileCache,
}

impl Fixture {
    async fn new() -> Self {
        let root = std::env::temp_dir().join(format!("motorhub-files-{}", Uuid::new_v4()));
        let server_db = Arc::new(Database::open_in_memory().unwrap());
        let device_db = Arc::new(Database::open_in_memory().unwrap());
        let blobs = Arc::new(FsBlobStore::new(root.join("blobs"), "file:///blobs").await.unwrap());
        let store = Arc::new(FileDedupStore::new(server_db, blobs));
        let cache = LocalFileCache::new(store.clone(), device_db.clone(), root.join("media"));
        Self {
            root,
            store,
            ledger: device_db,
            cache,
        }
    }

    async fn cleanup(self) {
        let _ = fs::remove_dir_all(&self.root).await;
    }
}

fn pdf_bytes() -> Bytes {
    // 2 MB of deterministic content standing in for a PDF
    Bytes::from((0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

#[tokio::test]
async fn test_identical_uploads_share_one_record_and_one_blob() {
    let fx = Fixture::new().await;
    let bytes = pdf_bytes();
    let h1 = content_hash(&bytes);
    let a = Participant::user("A");
    let c = Participant::user("C");

    let first = fx
        .store
        .put(&h1, bytes.clone(), "application/pdf", FileCategory::Document, &a)
        .await
        .unwrap();
    assert_eq!(first.referencing_users, BTreeSet::from([a.clone()]));
    assert_eq!(fx.store.stats().snapshot().uploads, 1);

    let second = fx
        .store
        .put(&h1, bytes.clone(), "application/pdf", FileCategory::Document, &c)
        .await
        .unwrap();
    assert_eq!(second.url, first.url);
    assert_eq!(second.referencing_users, BTreeSet::from([a.clone(), c.clone()]));

    // Re-uploading as A again changes nothing
    let third = fx
        .store
        .put(&h1, bytes, "application/pdf", FileCategory::Document, &a)
        .await
        .unwrap();
    assert_eq!(third.referencing_users, BTreeSet::from([a, c]));

    let stats = fx.store.stats().snapshot();
    assert_eq!(stats.uploads, 1);
    assert_eq!(stats.dedup_hits, 2);

    let blob = fx
        .root
        .join("blobs")
        .join(FileDedupStore::blob_path(&h1, FileCategory::Document));
    assert!(fs::try_exists(&blob).await.unwrap());
    fx.cleanup().await;
}

#[tokio::test]
async fn test_put_rejects_bytes_that_do_not_match_hash() {
    let fx = Fixture::new().await;
    let claimed = content_hash(b"what the client said");

    let err = fx
        .store
        .put(&claimed, Bytes::from_static(b"what it sent"), "text/plain", FileCategory::Document, &Participant::user("A"))
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::HashMismatch { .. }));
    assert!(fx.store.lookup(&claimed).await.unwrap().is_none());
    fx.cleanup().await;
}

#[tokio::test]
async fn test_resolve_downloads_once_then_hits_cache() {
    let fx = Fixture::new().await;
    let bytes = Bytes::from_static(b"\x89PNG fake image");
    let hash = content_hash(&bytes);
    fx.store
        .put(&hash, bytes.clone(), "image/png", FileCategory::Image, &Participant::user("A"))
        .await
        .unwrap();

    let path = fx.cache.resolve(&hash, "car.png").await.unwrap();
    assert!(path.starts_with(fx.cache.media_dir().join("images")));
    assert_eq!(fs::read(&path).await.unwrap(), bytes.to_vec());

    let again = fx.cache.resolve(&hash, "car.png").await.unwrap();
    assert_eq!(again, path);
    assert_eq!(fx.store.stats().snapshot().downloads, 1);
    fx.cleanup().await;
}

#[tokio::test]
async fn test_resolve_unknown_hash_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx.cache.resolve(&content_hash(b"never uploaded"), "x.bin").await.unwrap_err();
    assert!(matches!(err, FileError::NotFound { .. }));
    fx.cleanup().await;
}

#[tokio::test]
async fn test_reconcile_drops_vanished_files_and_is_idempotent() {
    let fx = Fixture::new().await;

    let kept = Bytes::from_static(b"kept document");
    let lost = Bytes::from_static(b"lost document");
    for bytes in [&kept, &lost] {
        fx.store
            .put(&content_hash(bytes), bytes.clone(), "application/pdf", FileCategory::Document, &Participant::user("A"))
            .await
            .unwrap();
    }
    fx.cache.resolve(&content_hash(&kept), "kept.pdf").await.unwrap();
    let lost_path = fx.cache.resolve(&content_hash(&lost), "lost.pdf").await.unwrap();

    fs::remove_file(&lost_path).await.unwrap();

    let first = fx.cache.reconcile().await.unwrap();
    assert_eq!(first.checked, 2);
    assert_eq!(first.removed, 1);
    assert_eq!(first.skipped, 0);

    let second = fx.cache.reconcile().await.unwrap();
    assert_eq!(second.checked, 1);
    assert_eq!(second.removed, 0);

    // Never re-fetches on its own
    assert!(!fs::try_exists(&lost_path).await.unwrap());
    assert_eq!(fx.store.stats().snapshot().downloads, 2);
    fx.cleanup().await;
}

#[tokio::test]
async fn test_unreadable_cache_entry_is_a_miss_but_kept() {
    let fx = Fixture::new().await;
    fs::create_dir_all(&fx.root).await.unwrap();

    // A path under a regular file cannot be stat'ed (ENOTDIR), unlike a missing one
    let plain = fx.root.join("plain.txt");
    fs::write(&plain, b"not a directory").await.unwrap();
    let hash = content_hash(b"unreachable");
    fx.ledger
        .upsert(&LocalDownloadRecord {
            hash: hash.clone(),
            file_name: "doc.pdf".into(),
            local_path: plain.join("doc.pdf"),
            mime_type: "application/pdf".into(),
            source: DownloadSource::Downloaded,
        })
        .await
        .unwrap();

    assert!(fx.cache.lookup(&hash).await.unwrap().is_none());
    assert!(fx.ledger.get(&hash).await.unwrap().is_some());

    let report = fx.cache.reconcile().await.unwrap();
    assert_eq!((report.checked, report.removed, report.skipped), (1, 0, 1));
    assert!(fx.ledger.get(&hash).await.unwrap().is_some());
    fx.cleanup().await;
}

#[tokio::test]
async fn test_record_upload_registers_senders_copy() {
    let fx = Fixture::new().await;
    fs::create_dir_all(&fx.root).await.unwrap();
    let local = fx.root.join("outgoing.pdf");
    fs::write(&local, b"sender copy").await.unwrap();
    let hash = content_hash(b"sender copy");

    let record = fx
        .cache
        .record_upload(&hash, "outgoing.pdf", &local, "application/pdf")
        .await
        .unwrap();
    assert_eq!(record.source, motorhub_types::DownloadSource::Uploaded);

    let found = fx.cache.lookup(&hash).await.unwrap().unwrap();
    assert_eq!(found.local_path, local);

    let wrong = content_hash(b"something else");
    assert!(matches!(
        fx.cache.record_upload(&wrong, "outgoing.pdf", &local, "application/pdf").await,
        Err(FileError::HashMismatch { .. })
    ));
    fx.cleanup().await;
}
