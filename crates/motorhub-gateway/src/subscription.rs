use futures_util::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use motorhub_types::events::ThreadEvent;
use motorhub_types::{Message, ThreadKey};

use crate::error::ChannelError;

/// Live feed of one thread: appended messages and in-place updates of known ids.
///
/// Transport termination (lag or shutdown) is yielded once as an error, after
/// which the subscription is finished. Callers resubscribe to continue.
pub struct Subscription {
    thread: ThreadKey,
    rx: broadcast::Receiver<ThreadEvent>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    finished: bool,
}

/// Cancels a subscription from outside the task that polls it.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

impl Subscription {
    pub(crate) fn new(
        thread: ThreadKey,
        rx: broadcast::Receiver<ThreadEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            thread,
            rx,
            cancel: CancellationToken::new(),
            shutdown,
            finished: false,
        }
    }

    pub fn thread(&self) -> &ThreadKey {
        &self.thread
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next message for this thread. `None` once cancelled or after a
    /// terminal error has been yielded.
    pub async fn next(&mut self) -> Option<Result<Message, ChannelError>> {
        if self.finished {
            return None;
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(thread = %self.thread, "Subscription cancelled");
                    self.finished = true;
                    return None;
                }
                _ = self.shutdown.cancelled() => {
                    self.finished = true;
                    return Some(Err(ChannelError::Disconnected));
                }
                result = self.rx.recv() => match result {
                    Ok(event) if event.thread == self.thread => return Some(Ok(event.message)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        warn!(thread = %self.thread, missed = n, "Subscription lagged, closing");
                        self.finished = true;
                        return Some(Err(ChannelError::Lagged(n)));
                    }
                    Err(RecvError::Closed) => {
                        self.finished = true;
                        return Some(Err(ChannelError::Disconnected));
                    }
                },
            }
        }
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Result<Message, ChannelError>> + Send {
        async_stream::stream! {
            while let Some(item) = self.next().await {
                yield item;
            }
        }
    }
}
