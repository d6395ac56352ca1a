use crate::error::{Error, Result};
use crate::models::enrollment::{ENROLLMENT_ENROLLED, ENROLLMENT_STARTED, ENROLLMENT_SUBMITTED};
use crate::models::exam::Exam;
use crate::models::exam_result::{ExamResult, RESULT_AUTO_SUBMITTED, RESULT_FAIL, RESULT_PASS};
use crate::models::question::ExamQuestion;
use crate::models::session::{ProctoringSession, FINAL_AUTO_SUBMITTED, FINAL_COMPLETED};
use crate::models::violation::{Severity, Violation, ViolationType};
use crate::services::grading_service::{GradeSummary, GradingService, SubmittedAnswer};
use crate::services::trust_score::TrustPolicy;
use crate::services::violation_ledger::{NewViolation, ViolationLedger};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Owns the session state machine and is the single entry point for all
/// session mutations. Every mutating operation locks the session row
/// (`SELECT ... FOR UPDATE`) before reading score or status, so concurrent
/// violation reports, submits and timeouts on one session serialize at the
/// database and no score update is lost.
#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    policy: TrustPolicy,
}

#[derive(Debug)]
pub struct StartedSession {
    pub session: ProctoringSession,
    pub exam: Exam,
    pub resumed: bool,
}

#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub violation_type: String,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub screenshot_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug)]
pub struct ViolationOutcome {
    pub violation: Violation,
    pub session: ProctoringSession,
    pub current_trust_score: i32,
    pub warning: bool,
    pub auto_submitted: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonitoredSession {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub exam_id: Uuid,
    pub exam_title: String,
    pub duration_minutes: i32,
    pub current_trust_score: i32,
    pub start_time: DateTime<Utc>,
    pub camera_active: bool,
    pub mic_active: bool,
}

impl SessionService {
    pub fn new(pool: PgPool, policy: TrustPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Start (or resume) a session for one student's attempt at one exam.
    ///
    /// Preconditions: enrollment exists, terms were accepted, and the
    /// acceptance trust score clears the critical threshold. If an active
    /// session already exists the call resumes it instead of erroring, so
    /// clients can safely retry.
    pub async fn start_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<StartedSession> {
        let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await?;
        if !exam.is_published || !exam.is_active {
            return Err(Error::Forbidden("Exam is not open".to_string()));
        }

        let enrollment: Option<(Uuid, String)> = sqlx::query_as(
            r#"SELECT id, enrollment_status FROM exam_enrollments
               WHERE student_id = $1 AND exam_id = $2"#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        let (enrollment_id, enrollment_status) =
            enrollment.ok_or_else(|| Error::NotFound("Not enrolled for this exam".to_string()))?;
        if enrollment_status == ENROLLMENT_SUBMITTED {
            return Err(Error::Conflict(
                "Exam already submitted for this enrollment".to_string(),
            ));
        }

        let acceptance: Option<(bool, i32)> = sqlx::query_as(
            r#"SELECT accepted, trust_score FROM acceptance_forms
               WHERE student_id = $1 AND exam_id = $2"#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        let (accepted, trust_score) = acceptance
            .ok_or_else(|| Error::Forbidden("Accept the exam terms first".to_string()))?;
        if !accepted {
            return Err(Error::Forbidden("Accept the exam terms first".to_string()));
        }
        if trust_score < self.policy.critical_threshold() {
            return Err(Error::Forbidden(
                "Trust score below the start threshold".to_string(),
            ));
        }

        if let Some(existing) = self.active_session(student_id, Some(exam_id)).await? {
            return Ok(StartedSession {
                session: existing,
                exam,
                resumed: true,
            });
        }

        let inserted = sqlx::query_as::<_, ProctoringSession>(
            r#"
            INSERT INTO proctoring_sessions (
                student_id, exam_id, enrollment_id, current_trust_score, ip_address, user_agent
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(enrollment_id)
        .bind(trust_score)
        .bind(ip)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await;

        let session = match inserted {
            Ok(session) => session,
            // Lost a concurrent start race: the partial unique index on
            // active sessions kicked in. Resume the winner.
            Err(sqlx::Error::Database(db)) if db.constraint() == Some("uq_active_session") => {
                let existing = self
                    .active_session(student_id, Some(exam_id))
                    .await?
                    .ok_or_else(|| Error::Internal("Active session vanished".to_string()))?;
                return Ok(StartedSession {
                    session: existing,
                    exam,
                    resumed: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            r#"UPDATE exam_enrollments SET enrollment_status = $1 WHERE id = $2 AND enrollment_status = $3"#,
        )
        .bind(ENROLLMENT_STARTED)
        .bind(enrollment_id)
        .bind(ENROLLMENT_ENROLLED)
        .execute(&self.pool)
        .await?;

        tracing::info!(%student_id, %exam_id, session_id = %session.id, "Exam session started");
        Ok(StartedSession {
            session,
            exam,
            resumed: false,
        })
    }

    pub async fn active_session(
        &self,
        student_id: Uuid,
        exam_id: Option<Uuid>,
    ) -> Result<Option<ProctoringSession>> {
        let row = sqlx::query_as::<_, ProctoringSession>(
            r#"
            SELECT * FROM proctoring_sessions
            WHERE student_id = $1 AND status = 'active'
              AND ($2::uuid IS NULL OR exam_id = $2)
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn latest_session(
        &self,
        student_id: Uuid,
        exam_id: Option<Uuid>,
    ) -> Result<Option<ProctoringSession>> {
        let row = sqlx::query_as::<_, ProctoringSession>(
            r#"
            SELECT * FROM proctoring_sessions
            WHERE student_id = $1 AND ($2::uuid IS NULL OR exam_id = $2)
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Liveness ping from the exam client.
    pub async fn heartbeat(&self, student_id: Uuid) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE proctoring_sessions SET last_heartbeat_at = NOW()
            WHERE student_id = $1 AND status = 'active'
            "#,
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound("No active proctoring session".to_string()));
        }
        Ok(())
    }

    pub async fn session_snapshot(&self, session_id: Uuid) -> Result<ProctoringSession> {
        let session =
            sqlx::query_as::<_, ProctoringSession>(r#"SELECT * FROM proctoring_sessions WHERE id = $1"#)
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(session)
    }

    /// Record a violation against the student's active session and apply
    /// the scoring policy. The ledger append, the score update and any
    /// auto-submit transition commit atomically; evidence was persisted
    /// (best-effort) before this call and notifications fan out after it.
    pub async fn report_violation(
        &self,
        student_id: Uuid,
        report: ViolationReport,
    ) -> Result<ViolationOutcome> {
        let violation_type = ViolationType::parse(&report.violation_type).ok_or_else(|| {
            Error::BadRequest(format!(
                "Unrecognized violation type: {}",
                report.violation_type
            ))
        })?;
        let severity = match report.severity.as_deref() {
            Some(raw) => Severity::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unrecognized severity: {}", raw)))?,
            None => Severity::Medium,
        };

        let session = self
            .active_session(student_id, None)
            .await?
            .ok_or_else(|| Error::NotFound("No active proctoring session".to_string()))?;

        let mut tx = self.pool.begin().await?;
        let locked = lock_session(&mut *tx, session.id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if !locked.is_active() {
            // Lost a race against auto-submit/submit/timeout.
            return Err(Error::Conflict("Session already ended".to_string()));
        }

        let reduction = self.policy.reduction_for(severity);
        let new_score = self.policy.apply(locked.current_trust_score, reduction);

        let violation = ViolationLedger::append(
            &mut *tx,
            NewViolation {
                session_id: locked.id,
                student_id: locked.student_id,
                exam_id: locked.exam_id,
                violation_type,
                severity,
                trust_score_reduction: reduction,
                description: report.description,
                screenshot_url: report.screenshot_url,
                video_url: report.video_url,
            },
        )
        .await?;

        sqlx::query(r#"UPDATE proctoring_sessions SET current_trust_score = $1 WHERE id = $2"#)
            .bind(new_score)
            .bind(locked.id)
            .execute(&mut *tx)
            .await?;

        let (session_after, auto_submitted) = if self.policy.is_critical(new_score) {
            let questions = questions_in_tx(&mut *tx, locked.exam_id).await?;
            let summary = GradingService::grade(&questions, &[], 0.0);
            let (ended, _result) = finalize(
                &mut *tx,
                &locked,
                new_score,
                FINAL_AUTO_SUBMITTED,
                RESULT_AUTO_SUBMITTED,
                &summary,
                Utc::now(),
            )
            .await?;
            (ended, true)
        } else {
            let mut updated = locked.clone();
            updated.current_trust_score = new_score;
            (updated, false)
        };

        tx.commit().await?;

        tracing::warn!(
            %student_id,
            session_id = %session_after.id,
            violation_type = violation_type.as_str(),
            severity = severity.as_str(),
            trust_score = new_score,
            auto_submitted,
            "Violation recorded"
        );

        Ok(ViolationOutcome {
            violation,
            current_trust_score: new_score,
            warning: self.policy.is_warning(new_score),
            auto_submitted,
            session: session_after,
        })
    }

    /// Explicit, student-initiated termination. A second submit on the
    /// same session observes `ended` under the lock and fails with a
    /// conflict; exactly one result row ever exists.
    pub async fn submit(
        &self,
        session_id: Uuid,
        answers: &[SubmittedAnswer],
    ) -> Result<(ProctoringSession, ExamResult, GradeSummary)> {
        let mut tx = self.pool.begin().await?;
        let locked = lock_session(&mut *tx, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if !locked.is_active() {
            return Err(Error::Conflict("Session already ended".to_string()));
        }

        let exam = exam_in_tx(&mut *tx, locked.exam_id).await?;
        let questions = questions_in_tx(&mut *tx, locked.exam_id).await?;
        let summary = GradingService::grade(
            &questions,
            answers,
            exam.negative_marking.to_f64().unwrap_or(0.0),
        );

        for graded in &summary.per_question {
            if graded.selected_answer.is_none() {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO student_answers (
                    enrollment_id, question_id, selected_answer, is_correct, marks_obtained
                ) VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(locked.enrollment_id)
            .bind(graded.question_id)
            .bind(graded.selected_answer.as_deref())
            .bind(graded.is_correct)
            .bind(Decimal::from_f64(graded.marks_obtained).unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }

        let result_status = if summary.passed(exam.passing_marks) {
            RESULT_PASS
        } else {
            RESULT_FAIL
        };
        let (session, result) = finalize(
            &mut *tx,
            &locked,
            locked.current_trust_score,
            FINAL_COMPLETED,
            result_status,
            &summary,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            obtained = summary.obtained_marks,
            total = summary.total_marks,
            status = result_status,
            "Exam submitted"
        );
        Ok((session, result, summary))
    }

    /// Force-end a session whose exam duration has elapsed. Safe to race
    /// against a concurrent submit: whichever transition locks the row
    /// first wins and the loser is a no-op (`Ok(None)`).
    pub async fn end_by_timeout(
        &self,
        session_id: Uuid,
    ) -> Result<Option<(ProctoringSession, ExamResult)>> {
        let mut tx = self.pool.begin().await?;
        let Some(locked) = lock_session(&mut *tx, session_id).await? else {
            return Ok(None);
        };
        if !locked.is_active() {
            return Ok(None);
        }

        let exam = exam_in_tx(&mut *tx, locked.exam_id).await?;
        let deadline = locked.start_time + chrono::Duration::minutes(exam.duration_minutes as i64);
        let now = Utc::now();
        if now < deadline {
            return Ok(None);
        }

        let questions = questions_in_tx(&mut *tx, locked.exam_id).await?;
        let summary = GradingService::grade(&questions, &[], 0.0);
        let (session, result) = finalize(
            &mut *tx,
            &locked,
            locked.current_trust_score,
            FINAL_AUTO_SUBMITTED,
            RESULT_AUTO_SUBMITTED,
            &summary,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::warn!(session_id = %session.id, "Session ended by timeout");
        Ok(Some((session, result)))
    }

    /// Scan for active sessions past their exam duration and end each.
    /// Driven by the deadline worker.
    pub async fn end_expired(&self) -> Result<Vec<(ProctoringSession, ExamResult)>> {
        let expired: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT s.id
            FROM proctoring_sessions s
            JOIN exams e ON e.id = s.exam_id
            WHERE s.status = 'active'
              AND s.start_time + make_interval(mins => e.duration_minutes) <= NOW()
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut ended = Vec::new();
        for session_id in expired {
            if let Some(pair) = self.end_by_timeout(session_id).await? {
                ended.push(pair);
            }
        }
        Ok(ended)
    }

    pub async fn active_sessions_for_examiner(
        &self,
        examiner_id: Uuid,
    ) -> Result<Vec<MonitoredSession>> {
        let rows = sqlx::query_as::<_, MonitoredSession>(
            r#"
            SELECT s.id AS session_id, s.student_id, u.name AS student_name,
                   u.email AS student_email, s.exam_id, e.title AS exam_title,
                   e.duration_minutes, s.current_trust_score, s.start_time,
                   s.camera_active, s.mic_active
            FROM proctoring_sessions s
            JOIN users u ON u.id = s.student_id
            JOIN exams e ON e.id = s.exam_id
            WHERE e.examiner_id = $1 AND s.status = 'active'
            ORDER BY s.start_time DESC
            "#,
        )
        .bind(examiner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Session snapshot for the examiner monitor; rejects sessions that
    /// belong to another examiner's exam.
    pub async fn session_for_examiner(
        &self,
        session_id: Uuid,
        examiner_id: Uuid,
    ) -> Result<ProctoringSession> {
        let session = self.session_snapshot(session_id).await?;
        let owner: Uuid = sqlx::query_scalar(r#"SELECT examiner_id FROM exams WHERE id = $1"#)
            .bind(session.exam_id)
            .fetch_one(&self.pool)
            .await?;
        if owner != examiner_id {
            return Err(Error::Forbidden(
                "Session belongs to another examiner's exam".to_string(),
            ));
        }
        Ok(session)
    }
}

async fn lock_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> Result<Option<ProctoringSession>> {
    let session = sqlx::query_as::<_, ProctoringSession>(
        r#"SELECT * FROM proctoring_sessions WHERE id = $1 FOR UPDATE"#,
    )
    .bind(session_id)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

async fn exam_in_tx(conn: &mut PgConnection, exam_id: Uuid) -> Result<Exam> {
    let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
        .bind(exam_id)
        .fetch_one(conn)
        .await?;
    Ok(exam)
}

async fn questions_in_tx(conn: &mut PgConnection, exam_id: Uuid) -> Result<Vec<ExamQuestion>> {
    let questions = sqlx::query_as::<_, ExamQuestion>(
        r#"SELECT * FROM exam_questions WHERE exam_id = $1 ORDER BY position, created_at"#,
    )
    .bind(exam_id)
    .fetch_all(conn)
    .await?;
    Ok(questions)
}

/// Terminal transition: flip the session to `ended`, stamp `end_time`,
/// write the one-and-only result row and mark the enrollment submitted.
/// Runs on the caller's transaction, under the session row lock.
async fn finalize(
    conn: &mut PgConnection,
    session: &ProctoringSession,
    final_trust_score: i32,
    final_status: &str,
    result_status: &str,
    summary: &GradeSummary,
    now: DateTime<Utc>,
) -> Result<(ProctoringSession, ExamResult)> {
    let ended = sqlx::query_as::<_, ProctoringSession>(
        r#"
        UPDATE proctoring_sessions
        SET status = 'ended', final_status = $1, end_time = $2, current_trust_score = $3
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(final_status)
    .bind(now)
    .bind(final_trust_score)
    .bind(session.id)
    .fetch_one(&mut *conn)
    .await?;

    let violation_count = ViolationLedger::count_in_tx(&mut *conn, session.id).await?;

    let result = sqlx::query_as::<_, ExamResult>(
        r#"
        INSERT INTO exam_results (
            enrollment_id, student_id, exam_id, obtained_marks, total_marks,
            percentage, status, violation_count, final_trust_score,
            correct_answers, incorrect_answers, unanswered, submitted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(session.enrollment_id)
    .bind(session.student_id)
    .bind(session.exam_id)
    .bind(Decimal::from_f64(summary.obtained_marks).unwrap_or_default())
    .bind(Decimal::from_f64(summary.total_marks).unwrap_or_default())
    .bind(Decimal::from_f64(summary.percentage).unwrap_or_default())
    .bind(result_status)
    .bind(violation_count as i32)
    .bind(final_trust_score)
    .bind(summary.correct_count)
    .bind(summary.incorrect_count)
    .bind(summary.unanswered_count)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(r#"UPDATE exam_enrollments SET enrollment_status = $1 WHERE id = $2"#)
        .bind(ENROLLMENT_SUBMITTED)
        .bind(session.enrollment_id)
        .execute(&mut *conn)
        .await?;

    Ok((ended, result))
}
