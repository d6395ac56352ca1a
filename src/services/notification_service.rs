use crate::error::Result;
use crate::models::notification::ExaminerNotification;
use crate::models::session::ProctoringSession;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Examiner-facing fan-out. Everything here is a side channel: callers
/// treat failures as log-and-continue, and the violation dispatch worker
/// picks unnotified ledger rows up again on the next pass.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    client: Client,
    email_webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(pool: PgPool, email_webhook_url: Option<String>) -> Self {
        Self {
            pool,
            client: Client::new(),
            email_webhook_url,
        }
    }

    pub async fn notify_examiner(
        &self,
        examiner_id: Uuid,
        student_id: Uuid,
        exam_id: Uuid,
        violation_id: Option<Uuid>,
        message: &str,
        severity_level: &str,
        proof_url: Option<&str>,
    ) -> Result<ExaminerNotification> {
        let row = sqlx::query_as::<_, ExaminerNotification>(
            r#"
            INSERT INTO examiner_notifications (
                examiner_id, student_id, exam_id, violation_id, message, severity_level, proof_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(examiner_id)
        .bind(student_id)
        .bind(exam_id)
        .bind(violation_id)
        .bind(message)
        .bind(severity_level)
        .bind(proof_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Notify the examiner that a session was force-ended. Invoked after
    /// the terminal transition has committed.
    pub async fn notify_session_ended(
        &self,
        session: &ProctoringSession,
        reason: &str,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            SELECT e.examiner_id, e.title, u.name AS student_name
            FROM exams e
            JOIN users u ON u.id = $2
            WHERE e.id = $1
            "#,
        )
        .bind(session.exam_id)
        .bind(session.student_id)
        .fetch_one(&self.pool)
        .await?;
        let examiner_id: Uuid = row.try_get("examiner_id")?;
        let exam_title: String = row.try_get("title")?;
        let student_name: String = row.try_get("student_name")?;

        let message = format!(
            "EXAM AUTO-SUBMITTED\nStudent: {}\nExam: {}\nReason: {}\nFinal trust score: {}%",
            student_name, exam_title, reason, session.current_trust_score
        );
        self.notify_examiner(
            examiner_id,
            session.student_id,
            session.exam_id,
            None,
            &message,
            "high",
            None,
        )
        .await?;

        self.send_email_webhook(&json!({
            "event": "session_ended",
            "session_id": session.id,
            "student_id": session.student_id,
            "exam_id": session.exam_id,
            "reason": reason,
            "final_trust_score": session.current_trust_score,
        }))
        .await;
        Ok(())
    }

    /// Claim one unnotified violation and fan it out. Returns Ok(true)
    /// when a violation was processed, Ok(false) when the queue is empty.
    pub async fn run_once(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row_opt = sqlx::query(
            r#"
            SELECT id FROM violations_log
            WHERE NOT is_notified
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row_opt else {
            return Ok(false);
        };
        let violation_id: Uuid = row.try_get("id")?;

        let detail = sqlx::query(
            r#"
            SELECT v.session_id, v.student_id, v.exam_id, v.violation_type, v.severity,
                   v.screenshot_url, v.video_url,
                   s.current_trust_score, e.examiner_id, e.title, u.name AS student_name
            FROM violations_log v
            JOIN proctoring_sessions s ON s.id = v.session_id
            JOIN exams e ON e.id = v.exam_id
            JOIN users u ON u.id = v.student_id
            WHERE v.id = $1
            "#,
        )
        .bind(violation_id)
        .fetch_one(&mut *tx)
        .await?;

        let student_id: Uuid = detail.try_get("student_id")?;
        let exam_id: Uuid = detail.try_get("exam_id")?;
        let examiner_id: Uuid = detail.try_get("examiner_id")?;
        let violation_type: String = detail.try_get("violation_type")?;
        let severity: String = detail.try_get("severity")?;
        let trust_score: i32 = detail.try_get("current_trust_score")?;
        let student_name: String = detail.try_get("student_name")?;
        let exam_title: String = detail.try_get("title")?;
        let proof_url: Option<String> = detail
            .try_get::<Option<String>, _>("screenshot_url")?
            .or(detail.try_get::<Option<String>, _>("video_url")?);

        let message = format!(
            "Violation: {} ({}) by {} in \"{}\". Trust score now {}%.",
            violation_type, severity, student_name, exam_title, trust_score
        );
        sqlx::query(
            r#"
            INSERT INTO examiner_notifications (
                examiner_id, student_id, exam_id, violation_id, message, severity_level, proof_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(examiner_id)
        .bind(student_id)
        .bind(exam_id)
        .bind(violation_id)
        .bind(&message)
        .bind(&severity)
        .bind(&proof_url)
        .execute(&mut *tx)
        .await?;

        sqlx::query(r#"UPDATE violations_log SET is_notified = TRUE WHERE id = $1"#)
            .bind(violation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.send_email_webhook(&json!({
            "event": "violation_reported",
            "violation_id": violation_id,
            "exam_id": exam_id,
            "student_id": student_id,
            "violation_type": violation_type,
            "severity": severity,
            "current_trust_score": trust_score,
        }))
        .await;

        Ok(true)
    }

    async fn send_email_webhook(&self, payload: &JsonValue) {
        let Some(url) = self.email_webhook_url.as_deref() else {
            return;
        };
        if let Err(e) = self.client.post(url).json(payload).send().await {
            tracing::error!(error = ?e, "Examiner email webhook delivery failed");
        }
    }

    pub async fn list(
        &self,
        examiner_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<ExaminerNotification>> {
        let rows = sqlx::query_as::<_, ExaminerNotification>(
            r#"
            SELECT * FROM examiner_notifications
            WHERE examiner_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(examiner_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, id: Uuid, examiner_id: Uuid) -> Result<()> {
        let updated = sqlx::query(
            r#"UPDATE examiner_notifications SET is_read = TRUE WHERE id = $1 AND examiner_id = $2"#,
        )
        .bind(id)
        .bind(examiner_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(crate::error::Error::NotFound(
                "Notification not found".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, examiner_id: Uuid) -> Result<u64> {
        let updated = sqlx::query(
            r#"UPDATE examiner_notifications SET is_read = TRUE WHERE examiner_id = $1 AND is_read = FALSE"#,
        )
        .bind(examiner_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected())
    }
}
