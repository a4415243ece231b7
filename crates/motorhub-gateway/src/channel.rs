use tracing::debug;

use motorhub_db::MessageRepositoryRef;
use motorhub_types::events::ThreadEvent;
use motorhub_types::{Message, MessageId, MessageStatus, Participant, ThreadKey};

use crate::dispatcher::Dispatcher;
use crate::error::ChannelError;
use crate::feed::ViewerFeed;
use crate::subscription::Subscription;

/// Durable, observable per-thread message list. Every successful write is
/// broadcast to the thread's subscribers.
#[derive(Clone)]
pub struct MessageChannel {
    repo: MessageRepositoryRef,
    dispatcher: Dispatcher,
}

impl MessageChannel {
    pub fn new(repo: MessageRepositoryRef, dispatcher: Dispatcher) -> Self {
        Self { repo, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn subscribe(&self, thread: &ThreadKey) -> Subscription {
        self.dispatcher.subscribe(thread.clone())
    }

    /// Subscribe on behalf of `viewer`. The snapshot is read after the
    /// subscription is live, so nothing written in between is missed.
    pub async fn subscribe_as(&self, thread: &ThreadKey, viewer: &Participant) -> Result<ViewerFeed, ChannelError> {
        let sub = self.subscribe(thread);
        let snapshot = self.snapshot(thread).await?;
        Ok(ViewerFeed::new(sub, viewer.clone(), &snapshot))
    }

    /// Current thread contents ordered by `(timestamp, id)`.
    pub async fn snapshot(&self, thread: &ThreadKey) -> Result<Vec<Message>, ChannelError> {
        let mut messages = self.repo.list_thread(thread).await?;
        messages.sort_by_key(|m| m.sort_key());
        Ok(messages)
    }

    pub async fn count(&self, thread: &ThreadKey) -> Result<u64, ChannelError> {
        Ok(self.repo.count_thread(thread).await?)
    }

    /// Look a message up by id, provided both its parties belong to `thread`.
    pub async fn find(&self, thread: &ThreadKey, id: MessageId) -> Result<Option<Message>, ChannelError> {
        let found = self.repo.get(id).await?;
        Ok(found.filter(|m| {
            m.car_id == thread.car_id && thread.is_member(&m.sender_id) && thread.is_member(&m.receiver_id)
        }))
    }

    pub async fn append(&self, thread: &ThreadKey, message: Message) -> Result<Message, ChannelError> {
        self.repo.insert(thread, &message).await?;
        debug!(thread = %thread, id = %message.id, "Message appended");
        self.publish(thread, message.clone());
        Ok(message)
    }

    /// Returns the updated message, or `None` if the transition was not legal
    /// from the stored status.
    pub async fn set_status(
        &self,
        thread: &ThreadKey,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<Option<Message>, ChannelError> {
        let updated = self.repo.advance_status(id, status).await?;
        if let Some(message) = &updated {
            debug!(thread = %thread, id = %id, status = status.as_str(), "Message status advanced");
            self.publish(thread, message.clone());
        }
        Ok(updated)
    }

    /// Returns the updated message, or `None` if `participant` was already in
    /// its deleted_for set.
    pub async fn mark_deleted_for(
        &self,
        thread: &ThreadKey,
        id: MessageId,
        participant: &Participant,
    ) -> Result<Option<Message>, ChannelError> {
        let updated = self.repo.add_deleted_for(id, participant).await?;
        if let Some(message) = &updated {
            self.publish(thread, message.clone());
        }
        Ok(updated)
    }

    fn publish(&self, thread: &ThreadKey, message: Message) {
        self.dispatcher.publish(ThreadEvent {
            thread: thread.clone(),
            message,
        });
    }
}
