use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only ledger row. Never updated after insert apart from the
/// `is_notified` flip once the dispatcher has fanned it out.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Violation {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub violation_type: String,
    pub severity: String,
    pub trust_score_reduction: i32,
    pub description: Option<String>,
    pub screenshot_url: Option<String>,
    pub video_url: Option<String>,
    pub is_notified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Violation tags the client-side detectors are allowed to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    PhoneDetected,
    TabSwitch,
    EyeGazeSuspicious,
    MultiplePersons,
    SoundDetected,
    BlurExitAttempt,
    FaceNotVisible,
    ExtremeHeadMovement,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::PhoneDetected => "phone_detected",
            ViolationType::TabSwitch => "tab_switch",
            ViolationType::EyeGazeSuspicious => "eye_gaze_suspicious",
            ViolationType::MultiplePersons => "multiple_persons",
            ViolationType::SoundDetected => "sound_detected",
            ViolationType::BlurExitAttempt => "blur_exit_attempt",
            ViolationType::FaceNotVisible => "face_not_visible",
            ViolationType::ExtremeHeadMovement => "extreme_head_movement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phone_detected" => Some(ViolationType::PhoneDetected),
            "tab_switch" => Some(ViolationType::TabSwitch),
            "eye_gaze_suspicious" => Some(ViolationType::EyeGazeSuspicious),
            "multiple_persons" => Some(ViolationType::MultiplePersons),
            "sound_detected" => Some(ViolationType::SoundDetected),
            "blur_exit_attempt" => Some(ViolationType::BlurExitAttempt),
            "face_not_visible" => Some(ViolationType::FaceNotVisible),
            "extreme_head_movement" => Some(ViolationType::ExtremeHeadMovement),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_type() {
        let all = [
            ViolationType::PhoneDetected,
            ViolationType::TabSwitch,
            ViolationType::EyeGazeSuspicious,
            ViolationType::MultiplePersons,
            ViolationType::SoundDetected,
            ViolationType::BlurExitAttempt,
            ViolationType::FaceNotVisible,
            ViolationType::ExtremeHeadMovement,
        ];
        for vt in all {
            assert_eq!(ViolationType::parse(vt.as_str()), Some(vt));
        }
        assert_eq!(ViolationType::parse("stood_up"), None);
    }

    #[test]
    fn severity_parse_rejects_unknown_levels() {
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("critical"), None);
        assert_eq!(Severity::parse("Low"), None);
    }
}
