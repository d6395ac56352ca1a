use crate::models::exam::Exam;
use crate::models::question::ExamQuestion;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateExamPayload {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: i32,
    #[validate(range(min = 0))]
    pub passing_marks: i32,
    pub negative_marking: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionPayload {
    #[validate(length(min = 1))]
    pub question_text: String,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    #[validate(length(min = 1, max = 1, message = "Answer must be a single letter"))]
    pub correct_answer: String,
    #[validate(range(min = 1))]
    pub marks: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AcceptTermsPayload {
    pub rules_accepted: bool,
    pub honor_code_accepted: bool,
    pub privacy_accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub negative_marking: f64,
}

impl From<Exam> for ExamSummary {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            instructions: exam.instructions,
            duration_minutes: exam.duration_minutes,
            total_marks: exam.total_marks,
            passing_marks: exam.passing_marks,
            negative_marking: exam.negative_marking.to_f64().unwrap_or(0.0),
        }
    }
}

/// Question as shown to a student: the correct answer stays server-side.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_text: String,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub marks: i32,
    pub position: i32,
}

impl From<ExamQuestion> for QuestionView {
    fn from(q: ExamQuestion) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            option_a: q.option_a,
            option_b: q.option_b,
            option_c: q.option_c,
            option_d: q.option_d,
            marks: q.marks,
            position: q.position,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartExamResponse {
    pub session_id: Uuid,
    pub exam_title: String,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub current_trust_score: i32,
    pub resumed: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewResultPayload {
    #[validate(length(min = 1))]
    pub remarks: String,
}
