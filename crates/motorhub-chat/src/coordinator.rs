use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use motorhub_files::{FileDedupStore, LocalFileCache, content_hash};
use motorhub_gateway::{MessageChannel, Subscription, ThreadView, ViewerFeed};
use motorhub_types::{
    Attachment, CarId, ContentHash, FileCategory, Message, MessageId, MessageStatus, Participant,
    ThreadKey,
};

use crate::blocking::BlockingPolicy;
use crate::error::ChatError;
use crate::notify::Notifier;
use crate::stats::ChatStats;

/// An attachment as handed over by the sender.
#[derive(Debug, Clone)]
pub struct FileDraft {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
    /// Hash claimed by the client. Computed from `bytes` when absent.
    pub hash: Option<ContentHash>,
    /// The sender's own copy on this device, if any.
    pub local_path: Option<PathBuf>,
}

/// A send that failed and is parked until the sender retries it.
struct PendingSend {
    message: Message,
    file: Option<FileDraft>,
}

/// Orchestrates sends, reads, deletions and blocks across all thread lanes.
/// Every call names the participant acting.
pub struct ChatCoordinator {
    channel: MessageChannel,
    blocking: BlockingPolicy,
    files: Arc<FileDedupStore>,
    cache: Arc<LocalFileCache>,
    notifier: Arc<dyn Notifier>,
    outbox: Mutex<HashMap<ThreadKey, Vec<PendingSend>>>,
    stats: Arc<ChatStats>,
}

impl ChatCoordinator {
    pub fn new(
        channel: MessageChannel,
        blocking: BlockingPolicy,
        files: Arc<FileDedupStore>,
        cache: Arc<LocalFileCache>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<ChatStats>,
    ) -> Self {
        Self {
            channel,
            blocking,
            files,
            cache,
            notifier,
            outbox: Mutex::new(HashMap::new()),
            stats,
        }
    }

    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    pub fn blocking(&self) -> &BlockingPolicy {
        &self.blocking
    }

    pub fn stats(&self) -> &Arc<ChatStats> {
        &self.stats
    }

    // -- Sending --

    /// Send a text message. A failed write still returns `Ok`, with the
    /// message in `failed` status and parked for manual retry.
    pub async fn send_text(
        &self,
        thread: &ThreadKey,
        sender: &Participant,
        content: &str,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::InvalidInput("message content is empty".into()));
        }

        let message = self.compose(thread, sender, Some(content.to_string()))?;
        Ok(self.attempt(thread, message, None).await)
    }

    /// Send a file message. Same failure semantics as [`send_text`](Self::send_text).
    pub async fn send_file(
        &self,
        thread: &ThreadKey,
        sender: &Participant,
        draft: FileDraft,
    ) -> Result<Message, ChatError> {
        if draft.bytes.is_empty() {
            return Err(ChatError::InvalidInput("file is empty".into()));
        }
        // A wrong claimed hash would fail every retry the same way, so it is
        // rejected here instead of parking the send
        if let Some(claimed) = &draft.hash {
            motorhub_files::hash::verify(claimed, &draft.bytes)?;
        }

        let message = self.compose(thread, sender, None)?;
        Ok(self.attempt(thread, message, Some(draft)).await)
    }

    /// Sends by `sender` on this thread that failed and await a retry.
    pub fn failed_messages(&self, thread: &ThreadKey, sender: &Participant) -> Vec<Message> {
        self.lock_outbox()
            .get(thread)
            .map(|pending| {
                pending
                    .iter()
                    .filter(|p| p.message.sender_id == *sender)
                    .map(|p| p.message.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Re-attempt a failed send under its original id.
    pub async fn retry(
        &self,
        thread: &ThreadKey,
        sender: &Participant,
        id: MessageId,
    ) -> Result<Message, ChatError> {
        let pending = {
            let mut outbox = self.lock_outbox();
            let queue = outbox.get_mut(thread);
            let position = queue
                .as_ref()
                .and_then(|q| q.iter().position(|p| p.message.id == id && p.message.sender_id == *sender));
            match (queue, position) {
                (Some(queue), Some(i)) => queue.remove(i),
                _ => return Err(ChatError::not_found("failed message", id)),
            }
        };

        ChatStats::bump(&self.stats.retries);
        let mut message = pending.message;
        message.status = MessageStatus::Sent;
        message.timestamp = Utc::now();
        // Never stored, so blocks are judged afresh for this attempt
        message.deleted_for.clear();
        if let Some(attachment) = message.attachment.as_mut() {
            attachment.file_url = None;
        }

        debug!(thread = %thread, id = %id, "Retrying failed send");
        Ok(self.attempt(thread, message, pending.file).await)
    }

    fn compose(
        &self,
        thread: &ThreadKey,
        sender: &Participant,
        content: Option<String>,
    ) -> Result<Message, ChatError> {
        let receiver = thread
            .counterpart(sender)
            .ok_or_else(|| ChatError::PermissionDenied(format!("{} cannot send on {}", sender, thread)))?;

        Ok(Message {
            id: MessageId::new(),
            sender_id: sender.clone(),
            receiver_id: receiver,
            content,
            attachment: None,
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            car_id: thread.car_id.clone(),
            deleted_for: BTreeSet::new(),
        })
    }

    /// Write a message, degrading any failure to a parked `failed` message.
    async fn attempt(&self, thread: &ThreadKey, mut message: Message, file: Option<FileDraft>) -> Message {
        match self.write(thread, &mut message, file.as_ref()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(thread = %thread, id = %message.id, "Send failed: {}", e);
                ChatStats::bump(&self.stats.send_failures);
                message.status = MessageStatus::Failed;
                self.lock_outbox()
                    .entry(thread.clone())
                    .or_default()
                    .push(PendingSend {
                        message: message.clone(),
                        file,
                    });
                message
            }
        }
    }

    async fn write(
        &self,
        thread: &ThreadKey,
        message: &mut Message,
        file: Option<&FileDraft>,
    ) -> Result<Message, ChatError> {
        let sender = message.sender_id.clone();
        let receiver = message.receiver_id.clone();

        // The receiver never sees messages sent while they block the sender on this car
        if self.blocking.is_blocked(&receiver, &sender, &thread.car_id).await? {
            message.deleted_for.insert(receiver.clone());
            ChatStats::bump(&self.stats.blocked_deliveries);
            debug!(thread = %thread, id = %message.id, "Receiver blocked sender, hiding message from them");
        }

        if let Some(draft) = file {
            let hash = draft.hash.clone().unwrap_or_else(|| content_hash(&draft.bytes));
            let category = FileCategory::infer(None, &draft.mime_type);
            message.attachment = Some(Attachment {
                file_url: None,
                mime_type: draft.mime_type.clone(),
                category,
                file_name: draft.file_name.clone(),
                file_size: draft.bytes.len() as u64,
                hash: hash.clone(),
            });

            let record = self
                .files
                .put(&hash, draft.bytes.clone(), &draft.mime_type, category, &sender)
                .await?;
            if let Some(attachment) = message.attachment.as_mut() {
                attachment.file_url = Some(record.url);
            }

            if let Some(path) = &draft.local_path {
                if let Err(e) = self
                    .cache
                    .record_upload(&hash, &draft.file_name, path, &draft.mime_type)
                    .await
                {
                    warn!(hash = %hash, "Could not register sender's local copy: {}", e);
                }
            }
        }

        let first_in_thread = self.channel.count(thread).await? == 0;
        let stored = self.channel.append(thread, message.clone()).await?;
        ChatStats::bump(&self.stats.messages_sent);

        if first_in_thread && stored.is_visible_to(&receiver) {
            self.notifier.notify(&receiver, "New conversation", &stored.preview());
        }

        Ok(stored)
    }

    // -- Reading --

    /// Open a thread as `viewer`: everything visible to them, with every
    /// message addressed to them moved to `read`.
    pub async fn open_thread(&self, thread: &ThreadKey, viewer: &Participant) -> Result<Vec<Message>, ChatError> {
        self.ensure_member(thread, viewer)?;

        let mut view = ThreadView::from_snapshot(self.channel.snapshot(thread).await?);
        let unread: Vec<MessageId> = view
            .visible_to(viewer)
            .into_iter()
            .filter(|m| m.is_addressed_to(viewer) && m.status == MessageStatus::Sent)
            .map(|m| m.id)
            .collect();

        for id in unread {
            if let Some(updated) = self.channel.set_status(thread, id, MessageStatus::Read).await? {
                ChatStats::bump(&self.stats.reads_marked);
                view.apply(updated);
            }
        }

        Ok(view.visible_to(viewer).into_iter().cloned().collect())
    }

    pub async fn mark_read(
        &self,
        thread: &ThreadKey,
        viewer: &Participant,
        id: MessageId,
    ) -> Result<Message, ChatError> {
        let message = self.find_visible(thread, viewer, id).await?;
        if !message.is_addressed_to(viewer) {
            return Err(ChatError::PermissionDenied("only the receiver can mark a message read".into()));
        }

        match self.channel.set_status(thread, id, MessageStatus::Read).await? {
            Some(updated) => {
                ChatStats::bump(&self.stats.reads_marked);
                Ok(updated)
            }
            None => Ok(message),
        }
    }

    /// Subscribe to a thread's live feed on behalf of `viewer`.
    pub fn subscribe(&self, thread: &ThreadKey, viewer: &Participant) -> Result<Subscription, ChatError> {
        self.ensure_member(thread, viewer)?;
        Ok(self.channel.subscribe(thread))
    }

    /// Live feed of a thread as `viewer` sees it: hidden messages are
    /// withheld, but a message already shown is followed until it is hidden.
    pub async fn feed(&self, thread: &ThreadKey, viewer: &Participant) -> Result<ViewerFeed, ChatError> {
        self.ensure_member(thread, viewer)?;
        Ok(self.channel.subscribe_as(thread, viewer).await?)
    }

    // -- Deleting --

    /// Hide one message from `viewer`. The other party keeps seeing it.
    pub async fn delete_for(
        &self,
        thread: &ThreadKey,
        viewer: &Participant,
        id: MessageId,
    ) -> Result<Message, ChatError> {
        let message = self.find_visible(thread, viewer, id).await?;
        Ok(self
            .channel
            .mark_deleted_for(thread, id, viewer)
            .await?
            .unwrap_or(message))
    }

    /// Hide every message currently in the thread from `viewer`. Returns how
    /// many were newly hidden.
    pub async fn clear_thread(&self, thread: &ThreadKey, viewer: &Participant) -> Result<usize, ChatError> {
        self.ensure_member(thread, viewer)?;

        let mut cleared = 0;
        for message in self.channel.snapshot(thread).await? {
            if !message.is_visible_to(viewer) {
                continue;
            }
            if self.channel.mark_deleted_for(thread, message.id, viewer).await?.is_some() {
                cleared += 1;
            }
        }

        info!(thread = %thread, viewer = %viewer, cleared, "Thread cleared");
        Ok(cleared)
    }

    // -- Attachments --

    /// Local path of a message's attachment, downloading it on first access.
    /// The viewer is recorded as referencing the file.
    pub async fn fetch_attachment(
        &self,
        thread: &ThreadKey,
        viewer: &Participant,
        id: MessageId,
    ) -> Result<(ContentHash, PathBuf), ChatError> {
        let message = self.find_visible(thread, viewer, id).await?;
        let attachment = message
            .attachment
            .filter(|a| a.file_url.is_some())
            .ok_or_else(|| ChatError::not_found("attachment", id))?;

        self.files.add_reference(&attachment.hash, viewer).await?;
        let path = self.cache.resolve(&attachment.hash, &attachment.file_name).await?;
        Ok((attachment.hash, path))
    }

    // -- Blocking --

    pub async fn block(&self, actor: &Participant, other: &Participant, car_id: &CarId) -> Result<bool, ChatError> {
        let created = self.blocking.block(actor, other, car_id).await?;
        if created {
            self.notifier.notify(
                other,
                "Conversation blocked",
                &format!("You can no longer reach this user about car {}", car_id),
            );
        }
        Ok(created)
    }

    pub async fn unblock(&self, actor: &Participant, other: &Participant, car_id: &CarId) -> Result<bool, ChatError> {
        let removed = self.blocking.unblock(actor, other, car_id).await?;
        if removed {
            self.notifier.notify(
                other,
                "Conversation unblocked",
                &format!("You can message this user about car {} again", car_id),
            );
        }
        Ok(removed)
    }

    // -- Helpers --

    fn ensure_member(&self, thread: &ThreadKey, participant: &Participant) -> Result<(), ChatError> {
        if thread.is_member(participant) {
            Ok(())
        } else {
            Err(ChatError::PermissionDenied(format!("{} is not part of {}", participant, thread)))
        }
    }

    async fn find_visible(
        &self,
        thread: &ThreadKey,
        viewer: &Participant,
        id: MessageId,
    ) -> Result<Message, ChatError> {
        self.ensure_member(thread, viewer)?;
        self.channel
            .find(thread, id)
            .await?
            .filter(|m| m.is_visible_to(viewer))
            .ok_or_else(|| ChatError::not_found("message", id))
    }

    fn lock_outbox(&self) -> MutexGuard<'_, HashMap<ThreadKey, Vec<PendingSend>>> {
        self.outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
