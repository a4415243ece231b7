use std::collections::HashMap;

use motorhub_types::{Message, MessageId, Participant};

/// Client-side projection of a thread: one entry per id, rendered in
/// timestamp order.
#[derive(Debug, Default, Clone)]
pub struct ThreadView {
    messages: HashMap<MessageId, Message>,
}

impl ThreadView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut view = Self::new();
        for message in messages {
            view.apply(message);
        }
        view
    }

    /// Merge a message into the view. Returns true if anything changed.
    ///
    /// A known id only takes a status that is a legal move from its current
    /// one, and its `deleted_for` set is unioned; everything else is immutable.
    pub fn apply(&mut self, incoming: Message) -> bool {
        let Some(existing) = self.messages.get_mut(&incoming.id) else {
            self.messages.insert(incoming.id, incoming);
            return true;
        };

        let mut changed = false;
        if existing.status.can_transition_to(incoming.status) {
            existing.status = incoming.status;
            changed = true;
        }
        for participant in incoming.deleted_for {
            changed |= existing.deleted_for.insert(participant);
        }
        changed
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn ordered(&self) -> Vec<&Message> {
        let mut out: Vec<&Message> = self.messages.values().collect();
        out.sort_by_key(|m| m.sort_key());
        out
    }

    /// Ordered messages minus those the viewer deleted (or never saw because
    /// they had blocked the sender).
    pub fn visible_to(&self, viewer: &Participant) -> Vec<&Message> {
        self.ordered()
            .into_iter()
            .filter(|m| m.is_visible_to(viewer))
            .collect()
    }
}
