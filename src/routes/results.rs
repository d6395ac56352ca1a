use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn my_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let student_id = claims.user_id()?;
    let result = state
        .exam_service
        .result_for_student(student_id, exam_id)
        .await?;
    Ok(Json(result).into_response())
}
