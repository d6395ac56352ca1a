pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    audit_service::AuditService, evidence_service::EvidenceService, exam_service::ExamService,
    notification_service::NotificationService, session_service::SessionService,
    trust_score::TrustPolicy, violation_ledger::ViolationLedger,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub session_service: SessionService,
    pub exam_service: ExamService,
    pub evidence_service: EvidenceService,
    pub notification_service: NotificationService,
    pub violation_ledger: ViolationLedger,
    pub audit_service: AuditService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let policy = TrustPolicy::from_config(config);

        let session_service = SessionService::new(pool.clone(), policy);
        let exam_service = ExamService::new(pool.clone());
        let evidence_service = EvidenceService::from_config();
        let notification_service =
            NotificationService::new(pool.clone(), config.examiner_email_webhook_url.clone());
        let violation_ledger = ViolationLedger::new(pool.clone());
        let audit_service = AuditService::new(pool.clone());

        Self {
            pool,
            session_service,
            exam_service,
            evidence_service,
            notification_service,
            violation_ledger,
            audit_service,
        }
    }
}
