use crate::models::violation::Violation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct ReportViolationResponse {
    pub violation_id: Uuid,
    pub current_trust_score: i32,
    pub warning: bool,
    pub auto_submitted: bool,
    pub evidence_saved: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerPayload {
    pub question_id: Uuid,
    pub selected_answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitExamRequest {
    /// Scopes the implicit active-session lookup when a student is
    /// enrolled in several exams at once.
    pub exam_id: Option<Uuid>,
    pub answers: Vec<AnswerPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitExamResponse {
    pub session_id: Uuid,
    pub obtained_marks: f64,
    pub total_marks: f64,
    pub percentage: f64,
    pub status: String,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub unanswered: i32,
    pub violation_count: i32,
    pub final_trust_score: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub exam_id: Uuid,
    pub status: String,
    pub final_status: Option<String>,
    pub current_trust_score: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub camera_active: bool,
    pub mic_active: bool,
    pub screen_locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViolationView {
    pub id: Uuid,
    pub violation_type: String,
    pub severity: String,
    pub trust_score_reduction: i32,
    pub description: Option<String>,
    pub screenshot_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Violation> for ViolationView {
    fn from(v: Violation) -> Self {
        Self {
            id: v.id,
            violation_type: v.violation_type,
            severity: v.severity,
            trust_score_reduction: v.trust_score_reduction,
            description: v.description,
            screenshot_url: v.screenshot_url,
            video_url: v.video_url,
            created_at: v.created_at,
        }
    }
}
