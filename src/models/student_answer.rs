use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentAnswer {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub question_id: Uuid,
    pub selected_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub marks_obtained: Decimal,
    pub created_at: DateTime<Utc>,
}
