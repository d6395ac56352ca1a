use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const RESULT_PASS: &str = "pass";
pub const RESULT_FAIL: &str = "fail";
pub const RESULT_AUTO_SUBMITTED: &str = "auto_submitted";

/// Created exactly once per session end; immutable afterwards except for
/// the examiner review fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamResult {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub obtained_marks: Decimal,
    pub total_marks: Decimal,
    pub percentage: Decimal,
    pub status: String,
    pub violation_count: i32,
    pub final_trust_score: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub unanswered: i32,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}
