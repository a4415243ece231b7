use thiserror::Error;

use motorhub_files::FileError;
use motorhub_gateway::ChannelError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Files(#[from] FileError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl ChatError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
