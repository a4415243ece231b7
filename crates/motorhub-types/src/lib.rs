pub mod api;
pub mod events;
pub mod models;
pub mod thread;

pub use models::{
    Attachment, BlockRelation, ContentHash, DownloadSource, FileCategory, FileRecord,
    LocalDownloadRecord, Message, MessageId, MessageStatus, ModerationReport, REPORT_SAMPLE_SIZE,
};
pub use thread::{CarId, Participant, Role, ThreadKey, ThreadOwner, UserId};

/// Errors produced when parsing the string encodings used on the wire and in storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid participant '{0}'")]
    Participant(String),
    #[error("invalid thread path '{0}'")]
    ThreadPath(String),
    #[error("invalid thread owner '{0}'")]
    ThreadOwner(String),
    #[error("invalid path segment '{0}'")]
    Segment(String),
    #[error("invalid content hash '{0}'")]
    ContentHash(String),
    #[error("invalid message status '{0}'")]
    Status(String),
    #[error("invalid file category '{0}'")]
    Category(String),
    #[error("invalid download source '{0}'")]
    Source(String),
    #[error("empty identifier")]
    EmptyId,
}
