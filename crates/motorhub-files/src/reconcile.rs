use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::LocalFileCache;

/// Background task that keeps the device ledger honest.
///
/// Runs on an interval, sweeps the ledger for rows whose file has been
/// removed from disk, and drops them. The first sweep runs immediately.
pub async fn run_reconcile_loop(cache: Arc<LocalFileCache>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match cache.reconcile().await {
            Ok(report) if report.removed > 0 || report.skipped > 0 => {
                info!(
                    checked = report.checked,
                    removed = report.removed,
                    skipped = report.skipped,
                    "Reconcile: dropped stale ledger rows"
                );
            }
            Ok(report) => {
                debug!(checked = report.checked, "Reconcile: ledger clean");
            }
            Err(e) => {
                warn!("Reconcile error: {}", e);
            }
        }
    }
}
