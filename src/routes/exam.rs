use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::exam_dto::{
    AcceptTermsPayload, CreateExamPayload, CreateQuestionPayload, ExamSummary, QuestionView,
    StartExamResponse,
};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::AppState;

pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[axum::debug_handler]
pub async fn list_exams(State(state): State<AppState>) -> Result<Response> {
    let exams = state.exam_service.list_published().await?;
    let summaries: Vec<ExamSummary> = exams.into_iter().map(ExamSummary::from).collect();
    Ok(Json(json!({ "exams": summaries })).into_response())
}

#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    let enrollment = state.exam_service.enroll(student_id, exam_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)).into_response())
}

#[axum::debug_handler]
pub async fn accept_terms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<AcceptTermsPayload>,
) -> Result<Response> {
    payload.validate()?;
    let student_id = claims.user_id()?;

    let form = state
        .exam_service
        .accept_terms(
            student_id,
            exam_id,
            payload,
            client_ip(&headers),
            user_agent(&headers),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(form)).into_response())
}

#[axum::debug_handler]
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    let ip = client_ip(&headers);
    let ua = user_agent(&headers);

    let started = state
        .session_service
        .start_session(student_id, exam_id, ip.clone(), ua.clone())
        .await?;

    if !started.resumed {
        if let Err(e) = state
            .audit_service
            .log(
                Some(student_id),
                "start_session",
                "proctoring_session",
                started.session.id,
                Some(json!({ "exam_id": exam_id })),
                ip,
                ua,
            )
            .await
        {
            tracing::error!(error = ?e, "Failed to audit session start");
        }
    }

    Ok(Json(StartExamResponse {
        session_id: started.session.id,
        exam_title: started.exam.title,
        duration_minutes: started.exam.duration_minutes,
        total_marks: started.exam.total_marks,
        current_trust_score: started.session.current_trust_score,
        resumed: started.resumed,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    if state
        .exam_service
        .get_enrollment(student_id, exam_id)
        .await?
        .is_none()
    {
        return Err(crate::error::Error::NotFound(
            "Not enrolled for this exam".to_string(),
        ));
    }

    let questions = state.exam_service.get_questions(exam_id).await?;
    let views: Vec<QuestionView> = questions.into_iter().map(QuestionView::from).collect();
    Ok(Json(json!({ "total": views.len(), "questions": views })).into_response())
}

#[utoipa::path(
    post,
    path = "/api/examiner/exams",
    request_body = CreateExamPayload,
    responses(
        (status = 201, description = "Exam created"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<Response> {
    payload.validate()?;
    let examiner_id = claims.user_id()?;
    let exam = state.exam_service.create_exam(payload, examiner_id).await?;
    Ok((StatusCode::CREATED, Json(exam)).into_response())
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<Response> {
    payload.validate()?;
    let examiner_id = claims.user_id()?;
    let question = state
        .exam_service
        .add_question(exam_id, payload, examiner_id)
        .await?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[axum::debug_handler]
pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    state.exam_service.delete_exam(exam_id, examiner_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn publish_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let examiner_id = claims.user_id()?;
    let exam = state.exam_service.publish(exam_id, examiner_id).await?;
    Ok(Json(exam).into_response())
}
