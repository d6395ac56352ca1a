use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AcceptanceForm {
    pub id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub enrollment_id: Option<Uuid>,
    pub accepted: bool,
    pub rules_accepted: bool,
    pub honor_code_accepted: bool,
    pub privacy_accepted: bool,
    pub trust_score: i32,
    pub acceptance_ip: Option<String>,
    pub user_agent: Option<String>,
    pub accepted_at: DateTime<Utc>,
}
