use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ParseError;
use crate::thread::{CarId, Participant, ThreadKey, ThreadOwner};

/// How many trailing messages a moderation report captures.
pub const REPORT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse().map(Self)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Delivery status. Legal moves are `Sent -> Read` and `Sent -> Failed`;
/// both `Read` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Sent, MessageStatus::Read) | (MessageStatus::Sent, MessageStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::Sent)
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        MessageStatus::Sent
    }
}

impl FromStr for MessageStatus {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(MessageStatus::Sent),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            _ => Err(ParseError::Status(value.to_string())),
        }
    }
}

/// Lowercase hex SHA-256 of an attachment's bytes. The dedup key for files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub const HEX_LEN: usize = 64;

    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character prefix used to fan files out across directories.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.len() != Self::HEX_LEN || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::ContentHash(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Image,
    Video,
    Document,
}

impl FileCategory {
    /// Storage namespace for the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "images",
            FileCategory::Video => "videos",
            FileCategory::Document => "documents",
        }
    }

    /// An explicit hint wins; otherwise the mime major type decides.
    pub fn infer(hint: Option<&str>, mime_type: &str) -> Self {
        let normalized_hint = hint
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match normalized_hint.as_str() {
            "image" | "images" => FileCategory::Image,
            "video" | "videos" => FileCategory::Video,
            "document" | "documents" | "file" => FileCategory::Document,
            _ => match mime_type.split('/').next().unwrap_or_default() {
                "image" => FileCategory::Image,
                "video" => FileCategory::Video,
                _ => FileCategory::Document,
            },
        }
    }
}

impl FromStr for FileCategory {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "images" => Ok(FileCategory::Image),
            "videos" => Ok(FileCategory::Video),
            "documents" => Ok(FileCategory::Document),
            _ => Err(ParseError::Category(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Absent only on a message whose blob upload failed.
    pub file_url: Option<String>,
    pub mime_type: String,
    pub category: FileCategory,
    pub file_name: String,
    pub file_size: u64,
    pub hash: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: Participant,
    pub receiver_id: Participant,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub car_id: CarId,
    #[serde(default)]
    pub deleted_for: BTreeSet<Participant>,
}

impl Message {
    pub fn is_visible_to(&self, viewer: &Participant) -> bool {
        !self.deleted_for.contains(viewer)
    }

    pub fn is_addressed_to(&self, viewer: &Participant) -> bool {
        self.receiver_id == *viewer
    }

    /// Display order: timestamp first, id as the tie-break.
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.timestamp, self.id)
    }

    pub fn preview(&self) -> String {
        match (&self.content, &self.attachment) {
            (Some(text), _) => text.chars().take(80).collect(),
            (None, Some(file)) => format!("[{}] {}", file.category.as_str(), file.file_name),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: ContentHash,
    pub url: String,
    pub size: u64,
    pub mime_type: String,
    pub category: FileCategory,
    pub referencing_users: BTreeSet<Participant>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadSource {
    /// The device sent this file and kept its own copy.
    Uploaded,
    /// The device fetched this file from blob storage.
    Downloaded,
}

impl DownloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadSource::Uploaded => "uploaded",
            DownloadSource::Downloaded => "downloaded",
        }
    }
}

impl FromStr for DownloadSource {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uploaded" => Ok(DownloadSource::Uploaded),
            "downloaded" => Ok(DownloadSource::Downloaded),
            _ => Err(ParseError::Source(value.to_string())),
        }
    }
}

/// One row of the per-device media ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDownloadRecord {
    pub hash: ContentHash,
    pub file_name: String,
    pub local_path: PathBuf,
    pub mime_type: String,
    pub source: DownloadSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRelation {
    pub blocker: Participant,
    pub blocked: Participant,
    pub car_id: CarId,
    pub created_at: DateTime<Utc>,
}

/// A frozen copy of the tail of a thread, filed by one party against the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationReport {
    pub id: Uuid,
    pub reporter_id: Participant,
    pub reported_user_id: Participant,
    pub car_id: CarId,
    pub owner: ThreadOwner,
    pub thread: ThreadKey,
    pub timestamp: DateTime<Utc>,
    pub comment: Option<String>,
    pub messages: Vec<Message>,
    pub revised: bool,
}
