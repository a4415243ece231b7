use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;

use motorhub_chat::FileDraft;
use motorhub_types::api::{
    AttachmentResponse, Claims, ClearThreadResponse, SendMessageRequest, SendMessageResponse,
    ThreadResponse,
};
use motorhub_types::{CarId, ContentHash, MessageId, MessageStatus, ThreadKey, ThreadOwner, UserId};

use crate::error::ApiError;
use crate::state::AppState;

const FILE_NAME_HEADER: &str = "x-file-name";
const CONTENT_HASH_HEADER: &str = "x-content-hash";

#[derive(Debug, Deserialize)]
pub struct ThreadPath {
    pub car: String,
    pub owner: String,
    pub member: String,
}

impl ThreadPath {
    pub fn key(&self) -> Result<ThreadKey, ApiError> {
        let owner: ThreadOwner = self
            .owner
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;
        ThreadKey::new(owner, CarId::new(&self.car), UserId::new(&self.member))
            .map_err(|e| ApiError::BadRequest(format!("{}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagePath {
    pub car: String,
    pub owner: String,
    pub member: String,
    pub id: String,
}

impl MessagePath {
    fn parts(&self) -> Result<(ThreadKey, MessageId), ApiError> {
        let thread = ThreadPath {
            car: self.car.clone(),
            owner: self.owner.clone(),
            member: self.member.clone(),
        }
        .key()?;
        let id = self
            .id
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid message id '{}'", self.id)))?;
        Ok((thread, id))
    }
}

/// Open a thread: visible messages (marking the caller's unread ones read)
/// plus the caller's own failed sends.
pub async fn open_thread(
    State(state): State<AppState>,
    Path(path): Path<ThreadPath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = path.key()?;
    let viewer = claims.participant();

    let messages = state.chat.open_thread(&thread, &viewer).await?;
    let failed = state.chat.failed_messages(&thread, &viewer);
    Ok(Json(ThreadResponse { messages, failed }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(path): Path<ThreadPath>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = path.key()?;
    let message = state
        .chat
        .send_text(&thread, &claims.participant(), &req.content)
        .await?;
    Ok(send_response(message))
}

/// Raw-body upload. `content-type` gives the mime type, `x-file-name` the
/// display name, and `x-content-hash` optionally pins the expected hash.
pub async fn send_file(
    State(state): State<AppState>,
    Path(path): Path<ThreadPath>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let thread = path.key()?;

    let file_name = header_str(&headers, FILE_NAME_HEADER)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", FILE_NAME_HEADER)))?
        .to_string();
    let mime_type = header_str(&headers, header::CONTENT_TYPE.as_str())
        .unwrap_or("application/octet-stream")
        .to_string();
    let hash = header_str(&headers, CONTENT_HASH_HEADER)
        .map(|h| h.parse::<ContentHash>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;

    let draft = FileDraft {
        bytes: body,
        file_name,
        mime_type,
        hash,
        local_path: None,
    };
    let message = state.chat.send_file(&thread, &claims.participant(), draft).await?;
    Ok(send_response(message))
}

pub async fn clear_thread(
    State(state): State<AppState>,
    Path(path): Path<ThreadPath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = path.key()?;
    let cleared = state.chat.clear_thread(&thread, &claims.participant()).await?;
    Ok(Json(ClearThreadResponse { cleared }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(path): Path<MessagePath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, id) = path.parts()?;
    state.chat.delete_for(&thread, &claims.participant(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(path): Path<MessagePath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, id) = path.parts()?;
    let message = state.chat.mark_read(&thread, &claims.participant(), id).await?;
    Ok(Json(message))
}

pub async fn retry_message(
    State(state): State<AppState>,
    Path(path): Path<MessagePath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, id) = path.parts()?;
    let message = state.chat.retry(&thread, &claims.participant(), id).await?;
    Ok(send_response(message))
}

pub async fn get_attachment(
    State(state): State<AppState>,
    Path(path): Path<MessagePath>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, id) = path.parts()?;
    let (hash, local_path) = state
        .chat
        .fetch_attachment(&thread, &claims.participant(), id)
        .await?;
    Ok(Json(AttachmentResponse {
        hash: hash.to_string(),
        local_path: local_path.display().to_string(),
    }))
}

/// 201 when the message was written; 202 when it failed and is parked for retry.
fn send_response(message: motorhub_types::Message) -> impl IntoResponse {
    let code = match message.status {
        MessageStatus::Failed => StatusCode::ACCEPTED,
        _ => StatusCode::CREATED,
    };
    (
        code,
        Json(SendMessageResponse {
            status: message.status,
            message,
        }),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
