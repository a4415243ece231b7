use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the file pipeline. Shared between the dedup store, the device
/// cache and the reconcile loop.
#[derive(Debug, Default)]
pub struct FileStats {
    pub uploads: AtomicU64,
    pub dedup_hits: AtomicU64,
    pub downloads: AtomicU64,
    pub reconcile_removed: AtomicU64,
    pub reconcile_skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStatsSnapshot {
    pub uploads: u64,
    pub dedup_hits: u64,
    pub downloads: u64,
    pub reconcile_removed: u64,
    pub reconcile_skipped: u64,
}

impl FileStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FileStatsSnapshot {
        FileStatsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            reconcile_removed: self.reconcile_removed.load(Ordering::Relaxed),
            reconcile_skipped: self.reconcile_skipped.load(Ordering::Relaxed),
        }
    }
}
