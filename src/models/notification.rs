use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExaminerNotification {
    pub id: Uuid,
    pub examiner_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub violation_id: Option<Uuid>,
    pub message: String,
    pub severity_level: String,
    pub proof_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
