use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use motorhub_types::ThreadKey;
use motorhub_types::events::ThreadEvent;

use crate::subscription::Subscription;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Fans thread writes out to every live subscription.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscriber sees every event and filters by thread
    broadcast_tx: broadcast::Sender<ThreadEvent>,

    /// Tripped once on shutdown; live subscriptions end with `Disconnected`
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` is how many events a slow subscriber may fall behind before it lags out.
    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe to events of a single thread.
    pub fn subscribe(&self, thread: ThreadKey) -> Subscription {
        debug!(thread = %thread, "Subscription opened");
        Subscription::new(
            thread,
            self.inner.broadcast_tx.subscribe(),
            self.inner.shutdown.clone(),
        )
    }

    /// Publish an event. Events with no live subscriber are dropped.
    pub fn publish(&self, event: ThreadEvent) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }

    /// Terminate every live and future subscription.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(subscribers = self.subscriber_count(), "Dispatcher shutting down");
            self.inner.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
