use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageStatus};
use crate::thread::{Participant, UserId};

// -- JWT Claims --

/// JWT claims accepted by the HTTP surface and the WebSocket gateway.
/// Staff tokens act as the support desk rather than as an individual user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub staff: bool,
    pub exp: usize,
}

impl Claims {
    pub fn participant(&self) -> Participant {
        if self.staff {
            Participant::SupportDesk
        } else {
            Participant::User(UserId::new(self.sub.clone()))
        }
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub status: MessageStatus,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub messages: Vec<Message>,
    /// Sends by the caller that failed and are waiting for a manual retry.
    pub failed: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ClearThreadResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub hash: String,
    pub local_path: String,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileReportRequest {
    pub reported_user_id: Participant,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub blocked: bool,
}
