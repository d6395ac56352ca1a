use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ENROLLMENT_ENROLLED: &str = "enrolled";
pub const ENROLLMENT_STARTED: &str = "started";
pub const ENROLLMENT_SUBMITTED: &str = "submitted";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamEnrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub enrollment_status: String,
    pub enrolled_at: DateTime<Utc>,
}
