use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::dto::proctoring_dto::ViolationView;
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/examiner/monitor/active-sessions",
    responses(
        (status = 200, description = "Active sessions with recent violations"),
        (status = 403, description = "Not an examiner"),
    ),
)]
#[axum::debug_handler]
pub async fn active_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let sessions = state
        .session_service
        .active_sessions_for_examiner(examiner_id)
        .await?;

    let mut entries = Vec::with_capacity(sessions.len());
    for session in sessions {
        let recent = state
            .violation_ledger
            .list_recent(session.session_id, 5)
            .await?;
        let violations: Vec<ViolationView> = recent.into_iter().map(ViolationView::from).collect();
        entries.push(json!({
            "session": session,
            "recent_violations": violations,
        }));
    }

    Ok(Json(json!({
        "count": entries.len(),
        "active_sessions": entries,
    }))
    .into_response())
}

#[axum::debug_handler]
pub async fn session_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let session = state
        .session_service
        .session_for_examiner(session_id, examiner_id)
        .await?;

    let violations = state.violation_ledger.list_by_session(session_id).await?;
    let views: Vec<ViolationView> = violations.into_iter().map(ViolationView::from).collect();

    Ok(Json(json!({
        "session": session,
        "violation_count": views.len(),
        "violations": views,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub unread: Option<bool>,
    pub limit: Option<i64>,
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let notifications = state
        .notification_service
        .list(
            examiner_id,
            query.unread.unwrap_or(false),
            query.limit.unwrap_or(50).clamp(1, 200),
        )
        .await?;
    Ok(Json(json!({
        "count": notifications.len(),
        "notifications": notifications,
    }))
    .into_response())
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    state
        .notification_service
        .mark_read(notification_id, examiner_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let updated = state.notification_service.mark_all_read(examiner_id).await?;
    Ok(Json(json!({ "marked_read": updated })).into_response())
}

/// Stream a stored evidence file to the examiner.
#[axum::debug_handler]
pub async fn download_evidence(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let path = state
        .evidence_service
        .path_for_reference(&filename)
        .ok_or_else(|| Error::BadRequest("Invalid evidence reference".to_string()))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound("Evidence not found".to_string()));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let content_type = match path.extension().and_then(|s| s.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    };

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

#[axum::debug_handler]
pub async fn exam_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let results = state
        .exam_service
        .results_for_exam(exam_id, examiner_id)
        .await?;
    Ok(Json(json!({
        "count": results.len(),
        "results": results,
    }))
    .into_response())
}

#[axum::debug_handler]
pub async fn review_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(result_id): Path<Uuid>,
    Json(payload): Json<crate::dto::exam_dto::ReviewResultPayload>,
) -> Result<Response> {
    use validator::Validate;
    payload.validate()?;
    let examiner_id = claims.user_id()?;
    let result = state
        .exam_service
        .review_result(result_id, examiner_id, payload.remarks)
        .await?;
    Ok(Json(result).into_response())
}
