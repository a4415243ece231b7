use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use motorhub_chat::ChatError;
use motorhub_files::FileError;
use motorhub_gateway::ChannelError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chat(err) => match err {
                ChatError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                ChatError::NotFound { .. } => StatusCode::NOT_FOUND,
                ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                ChatError::Transport(_) => StatusCode::BAD_GATEWAY,
                ChatError::Files(FileError::NotFound { .. }) => StatusCode::NOT_FOUND,
                ChatError::Files(FileError::HashMismatch { .. } | FileError::InvalidPath(_)) => {
                    StatusCode::BAD_REQUEST
                }
                ChatError::Files(FileError::Transport(_)) => StatusCode::BAD_GATEWAY,
                ChatError::Files(FileError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                ChatError::Channel(ChannelError::Store(_)) => StatusCode::BAD_GATEWAY,
                ChatError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
