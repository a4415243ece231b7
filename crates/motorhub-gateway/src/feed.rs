use std::collections::HashSet;

use motorhub_types::{Message, MessageId, Participant, ThreadKey};

use crate::error::ChannelError;
use crate::subscription::{CancelHandle, Subscription};

/// A thread subscription filtered for one participant.
///
/// Messages hidden from the viewer are withheld, except for the update that
/// hides a message the viewer has already been shown: that one is passed on
/// so every session of the viewer can merge the new `deleted_for` by id.
pub struct ViewerFeed {
    sub: Subscription,
    viewer: Participant,
    shown: HashSet<MessageId>,
}

impl ViewerFeed {
    /// `snapshot` is what the viewer already has, typically read right after
    /// subscribing.
    pub fn new(sub: Subscription, viewer: Participant, snapshot: &[Message]) -> Self {
        let shown = snapshot
            .iter()
            .filter(|m| m.is_visible_to(&viewer))
            .map(|m| m.id)
            .collect();
        Self { sub, viewer, shown }
    }

    pub fn thread(&self) -> &ThreadKey {
        self.sub.thread()
    }

    pub fn viewer(&self) -> &Participant {
        &self.viewer
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.sub.cancel_handle()
    }

    pub async fn next(&mut self) -> Option<Result<Message, ChannelError>> {
        loop {
            let message = match self.sub.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e)),
            };

            if message.is_visible_to(&self.viewer) {
                self.shown.insert(message.id);
                return Some(Ok(message));
            }
            // deleted_for only grows, so this is the last update the viewer needs
            if self.shown.remove(&message.id) {
                return Some(Ok(message));
            }
        }
    }
}
