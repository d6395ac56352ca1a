pub mod audit_service;
pub mod evidence_service;
pub mod exam_service;
pub mod grading_service;
pub mod notification_service;
pub mod session_service;
pub mod trust_score;
pub mod violation_ledger;
