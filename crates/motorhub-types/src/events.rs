use serde::{Deserialize, Serialize};

use crate::models::Message;
use crate::thread::{Participant, ThreadKey};

/// A message written to a thread, either new or an in-place update of an
/// existing id. Consumers merge by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEvent {
    pub thread: ThreadKey,
    pub message: Message,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms who the connection is acting as
    Ready { participant: Participant },

    /// A message was appended or updated (status, deleted_for)
    MessageUpsert { thread: ThreadKey, message: Message },

    /// A subscription ended; the client must resubscribe to keep receiving
    SubscriptionLost { thread: ThreadKey, reason: String },

    /// A command was rejected
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving events for the given threads.
    Subscribe { threads: Vec<ThreadKey> },

    /// Stop receiving events for the given threads.
    Unsubscribe { threads: Vec<ThreadKey> },
}
