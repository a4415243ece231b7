use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ChatStats {
    pub messages_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub retries: AtomicU64,
    pub reads_marked: AtomicU64,
    /// Messages written pre-hidden from a receiver who blocked the sender
    pub blocked_deliveries: AtomicU64,
    pub reports_filed: AtomicU64,
    pub report_write_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatStatsSnapshot {
    pub messages_sent: u64,
    pub send_failures: u64,
    pub retries: u64,
    pub reads_marked: u64,
    pub blocked_deliveries: u64,
    pub reports_filed: u64,
    pub report_write_failures: u64,
}

impl ChatStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChatStatsSnapshot {
        ChatStatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            reads_marked: self.reads_marked.load(Ordering::Relaxed),
            blocked_deliveries: self.blocked_deliveries.load(Ordering::Relaxed),
            reports_filed: self.reports_filed.load(Ordering::Relaxed),
            report_write_failures: self.report_write_failures.load(Ordering::Relaxed),
        }
    }
}
