use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ENDED: &str = "ended";

pub const FINAL_COMPLETED: &str = "completed";
pub const FINAL_AUTO_SUBMITTED: &str = "auto_submitted";

/// One student's attempt instance at one exam. `status` only ever moves
/// `active` -> `ended`; `end_time` is set exactly at that transition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProctoringSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub enrollment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_trust_score: i32,
    pub status: String,
    pub final_status: Option<String>,
    pub camera_active: bool,
    pub mic_active: bool,
    pub screen_locked: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl ProctoringSession {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}
