use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;

use crate::dto::proctoring_dto::{
    ReportViolationResponse, SessionStatusResponse, SubmitExamRequest, SubmitExamResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::grading_service::SubmittedAnswer;
use crate::services::session_service::ViolationReport;
use crate::AppState;

/// Violation intake. Multipart form: `violation_type` (required),
/// `severity`, `description` and an optional `evidence` file part.
/// Evidence persistence is best-effort and never blocks the report.
#[axum::debug_handler]
pub async fn report_violation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Response> {
    let student_id = claims.user_id()?;

    let mut violation_type: Option<String> = None;
    let mut severity: Option<String> = None;
    let mut description: Option<String> = None;
    let mut screenshot_url: Option<String> = None;
    let mut video_url: Option<String> = None;
    let mut evidence: Option<(bytes::Bytes, String)> = None;
    let mut evidence_rejected = false;

    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "violation_type" => {
                violation_type = Some(field.text().await.map_err(Error::Multipart)?);
            }
            "severity" => {
                let value = field.text().await.map_err(Error::Multipart)?;
                if !value.trim().is_empty() {
                    severity = Some(value);
                }
            }
            "description" => {
                let value = field.text().await.map_err(Error::Multipart)?;
                if !value.trim().is_empty() {
                    description = Some(value);
                }
            }
            "evidence" => {
                let filename = field.file_name().unwrap_or("evidence").to_string();
                let data: bytes::Bytes = field.bytes().await.map_err(Error::Multipart)?;
                if data.is_empty() {
                    continue;
                }
                let extension = std::path::Path::new(&filename)
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_lowercase())
                    .unwrap_or_default();
                evidence = Some((data, extension));
            }
            _ => {}
        }
    }

    let violation_type = violation_type
        .ok_or_else(|| Error::BadRequest("violation_type is required".to_string()))?;

    // Evidence is persisted only for reports that can pass validation, and
    // before the score transaction; a failed save never blocks the report.
    if let Some((data, extension)) = evidence {
        if crate::models::violation::ViolationType::parse(&violation_type).is_some() {
            match state.evidence_service.save(&data, &extension).await {
                Some(reference) => {
                    if matches!(extension.as_str(), "mp4" | "avi" | "mov" | "webm") {
                        video_url = Some(reference);
                    } else {
                        screenshot_url = Some(reference);
                    }
                }
                None => evidence_rejected = true,
            }
        }
    }

    let evidence_saved = screenshot_url.is_some() || video_url.is_some();
    if evidence_rejected {
        tracing::warn!(%student_id, "Evidence discarded; recording violation without it");
    }

    let outcome = state
        .session_service
        .report_violation(
            student_id,
            ViolationReport {
                violation_type,
                severity,
                description,
                screenshot_url,
                video_url,
            },
        )
        .await?;

    if outcome.auto_submitted {
        if let Err(e) = state
            .notification_service
            .notify_session_ended(&outcome.session, "Trust score fell below the critical threshold")
            .await
        {
            tracing::error!(error = ?e, "Failed to notify examiner about auto-submit");
        }
        if let Err(e) = state
            .audit_service
            .log(
                Some(student_id),
                "auto_submit",
                "proctoring_session",
                outcome.session.id,
                Some(json!({ "final_trust_score": outcome.current_trust_score })),
                None,
                None,
            )
            .await
        {
            tracing::error!(error = ?e, "Failed to audit auto-submit");
        }
    }

    let message = if outcome.auto_submitted {
        "Trust score below the critical threshold. Exam has been auto-submitted.".to_string()
    } else {
        "Violation recorded".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(ReportViolationResponse {
            violation_id: outcome.violation.id,
            current_trust_score: outcome.current_trust_score,
            warning: outcome.warning,
            auto_submitted: outcome.auto_submitted,
            evidence_saved,
            message,
        }),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<Response> {
    let student_id = claims.user_id()?;

    // Implicit session lookup: the student's active session wins; when
    // none exists the latest session yields the right wrong-state error
    // for a duplicate submit.
    let session = match state
        .session_service
        .active_session(student_id, req.exam_id)
        .await?
    {
        Some(session) => session,
        None => state
            .session_service
            .latest_session(student_id, req.exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("No active proctoring session".to_string()))?,
    };

    let answers: Vec<SubmittedAnswer> = req
        .answers
        .into_iter()
        .map(|a| SubmittedAnswer {
            question_id: a.question_id,
            selected_answer: a.selected_answer,
        })
        .collect();

    let (ended, result, summary) = state.session_service.submit(session.id, &answers).await?;

    if let Err(e) = state
        .audit_service
        .log(
            Some(student_id),
            "submit_exam",
            "proctoring_session",
            ended.id,
            Some(json!({
                "obtained_marks": summary.obtained_marks,
                "total_marks": summary.total_marks,
                "status": result.status.clone(),
            })),
            None,
            None,
        )
        .await
    {
        tracing::error!(error = ?e, "Failed to audit submit");
    }

    Ok(Json(SubmitExamResponse {
        session_id: ended.id,
        obtained_marks: summary.obtained_marks,
        total_marks: summary.total_marks,
        percentage: summary.percentage,
        status: result.status,
        correct_answers: summary.correct_count,
        incorrect_answers: summary.incorrect_count,
        unanswered: summary.unanswered_count,
        violation_count: result.violation_count,
        final_trust_score: result.final_trust_score,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    state.session_service.heartbeat(student_id).await?;
    Ok(StatusCode::OK.into_response())
}

#[axum::debug_handler]
pub async fn get_session_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    let session = state.session_service.session_snapshot(session_id).await?;
    if session.student_id != student_id {
        return Err(Error::Forbidden(
            "Session belongs to another student".to_string(),
        ));
    }

    Ok(Json(SessionStatusResponse {
        session_id: session.id,
        exam_id: session.exam_id,
        status: session.status,
        final_status: session.final_status,
        current_trust_score: session.current_trust_score,
        start_time: session.start_time,
        end_time: session.end_time,
        camera_active: session.camera_active,
        mic_active: session.mic_active,
        screen_locked: session.screen_locked,
    })
    .into_response())
}
