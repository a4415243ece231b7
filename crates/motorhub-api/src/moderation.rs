use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use motorhub_types::api::{BlockResponse, Claims, FileReportRequest};
use motorhub_types::{CarId, Participant};

use crate::error::ApiError;
use crate::messages::ThreadPath;
use crate::state::AppState;

pub async fn file_report(
    State(state): State<AppState>,
    Path(path): Path<ThreadPath>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FileReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = path.key()?;
    let report = state
        .reports
        .report(&claims.participant(), &req.reported_user_id, &thread, req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn block_user(
    State(state): State<AppState>,
    Path((car, user)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .block(&claims.participant(), &Participant::user(user), &CarId::new(car))
        .await?;
    Ok(Json(BlockResponse { blocked: true }))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Path((car, user)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .unblock(&claims.participant(), &Participant::user(user), &CarId::new(car))
        .await?;
    Ok(Json(BlockResponse { blocked: false }))
}

// -- Staff only --

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_staff(&claims)?;
    Ok(Json(state.reports.list().await?))
}

pub async fn mark_revised(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_staff(&claims)?;
    state.reports.mark_revised(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_staff(claims: &Claims) -> Result<(), ApiError> {
    if claims.staff { Ok(()) } else { Err(ApiError::Forbidden) }
}
