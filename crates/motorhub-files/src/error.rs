use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("no file stored for hash {hash}")]
    NotFound { hash: String },

    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
