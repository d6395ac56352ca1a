use crate::error::Result;
use crate::models::violation::{Severity, Violation, ViolationType};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewViolation {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub trust_score_reduction: i32,
    pub description: Option<String>,
    pub screenshot_url: Option<String>,
    pub video_url: Option<String>,
}

/// Append-only log of violations per session. Appends run on the session
/// manager's transaction so a ledger row and the score change it caused
/// commit or roll back together; reads go straight to the pool.
#[derive(Clone)]
pub struct ViolationLedger {
    pool: PgPool,
}

impl ViolationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(conn: &mut PgConnection, entry: NewViolation) -> Result<Violation> {
        let violation = sqlx::query_as::<_, Violation>(
            r#"
            INSERT INTO violations_log (
                session_id, student_id, exam_id, violation_type, severity,
                trust_score_reduction, description, screenshot_url, video_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(entry.session_id)
        .bind(entry.student_id)
        .bind(entry.exam_id)
        .bind(entry.violation_type.as_str())
        .bind(entry.severity.as_str())
        .bind(entry.trust_score_reduction)
        .bind(entry.description)
        .bind(entry.screenshot_url)
        .bind(entry.video_url)
        .fetch_one(conn)
        .await?;
        Ok(violation)
    }

    pub async fn list_by_session(&self, session_id: Uuid) -> Result<Vec<Violation>> {
        let rows = sqlx::query_as::<_, Violation>(
            r#"SELECT * FROM violations_log WHERE session_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_recent(&self, session_id: Uuid, limit: i64) -> Result<Vec<Violation>> {
        let rows = sqlx::query_as::<_, Violation>(
            r#"SELECT * FROM violations_log WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2"#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_session(&self, session_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM violations_log WHERE session_id = $1"#)
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Count within the session manager's transaction, used when a
    /// terminal transition records `violation_count` on the result.
    pub async fn count_in_tx(conn: &mut PgConnection, session_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM violations_log WHERE session_id = $1"#)
                .bind(session_id)
                .fetch_one(conn)
                .await?;
        Ok(count)
    }
}
