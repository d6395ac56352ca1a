use crate::dto::exam_dto::{AcceptTermsPayload, CreateExamPayload, CreateQuestionPayload};
use crate::error::{Error, Result};
use crate::models::acceptance::AcceptanceForm;
use crate::models::enrollment::ExamEnrollment;
use crate::models::exam::Exam;
use crate::models::exam_result::ExamResult;
use crate::models::question::ExamQuestion;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ExamService {
    pool: PgPool,
}

impl ExamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_exam(&self, payload: CreateExamPayload, examiner_id: Uuid) -> Result<Exam> {
        let negative_marking = Decimal::from_f64(payload.negative_marking.unwrap_or(0.0))
            .ok_or_else(|| Error::BadRequest("Invalid negative marking".to_string()))?;
        if negative_marking < Decimal::ZERO {
            return Err(Error::BadRequest(
                "Negative marking cannot be negative".to_string(),
            ));
        }

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams (
                title, description, instructions, examiner_id,
                duration_minutes, passing_marks, negative_marking
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(payload.title)
        .bind(payload.description)
        .bind(payload.instructions)
        .bind(examiner_id)
        .bind(payload.duration_minutes)
        .bind(payload.passing_marks)
        .bind(negative_marking)
        .fetch_one(&self.pool)
        .await?;
        Ok(exam)
    }

    pub async fn get_exam(&self, exam_id: Uuid) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exam)
    }

    pub async fn list_published(&self) -> Result<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(
            r#"SELECT * FROM exams WHERE is_published AND is_active ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    async fn owned_exam(&self, exam_id: Uuid, examiner_id: Uuid) -> Result<Exam> {
        let exam = self.get_exam(exam_id).await?;
        if exam.examiner_id != examiner_id {
            return Err(Error::Forbidden(
                "Exam belongs to another examiner".to_string(),
            ));
        }
        Ok(exam)
    }

    pub async fn add_question(
        &self,
        exam_id: Uuid,
        payload: CreateQuestionPayload,
        examiner_id: Uuid,
    ) -> Result<ExamQuestion> {
        self.owned_exam(exam_id, examiner_id).await?;

        let correct = payload.correct_answer.trim().to_ascii_uppercase();
        if !matches!(correct.as_str(), "A" | "B" | "C" | "D") {
            return Err(Error::BadRequest(
                "Correct answer must be one of A, B, C, D".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let question = sqlx::query_as::<_, ExamQuestion>(
            r#"
            INSERT INTO exam_questions (
                exam_id, question_text, option_a, option_b, option_c, option_d,
                correct_answer, marks, position
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                COALESCE((SELECT MAX(position) + 1 FROM exam_questions WHERE exam_id = $1), 0))
            RETURNING *
            "#,
        )
        .bind(exam_id)
        .bind(payload.question_text)
        .bind(payload.option_a)
        .bind(payload.option_b)
        .bind(payload.option_c)
        .bind(payload.option_d)
        .bind(correct)
        .bind(payload.marks)
        .fetch_one(&mut *tx)
        .await?;

        // Keep the denormalized exam total in step with its questions.
        sqlx::query(r#"UPDATE exams SET total_marks = total_marks + $1, updated_at = NOW() WHERE id = $2"#)
            .bind(payload.marks)
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(question)
    }

    pub async fn publish(&self, exam_id: Uuid, examiner_id: Uuid) -> Result<Exam> {
        self.owned_exam(exam_id, examiner_id).await?;

        let question_count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM exam_questions WHERE exam_id = $1"#)
                .bind(exam_id)
                .fetch_one(&self.pool)
                .await?;
        if question_count == 0 {
            return Err(Error::BadRequest(
                "Add questions before publishing".to_string(),
            ));
        }

        let exam = sqlx::query_as::<_, Exam>(
            r#"UPDATE exams SET is_published = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exam)
    }

    /// Delete an exam and everything it owns. Children go first, in one
    /// transaction, so a partial failure never leaves orphans behind.
    pub async fn delete_exam(&self, exam_id: Uuid, examiner_id: Uuid) -> Result<()> {
        self.owned_exam(exam_id, examiner_id).await?;

        let mut tx = self.pool.begin().await?;
        for stmt in [
            r#"DELETE FROM examiner_notifications WHERE exam_id = $1"#,
            r#"DELETE FROM violations_log WHERE exam_id = $1"#,
            r#"DELETE FROM student_answers WHERE enrollment_id IN
               (SELECT id FROM exam_enrollments WHERE exam_id = $1)"#,
            r#"DELETE FROM exam_results WHERE exam_id = $1"#,
            r#"DELETE FROM proctoring_sessions WHERE exam_id = $1"#,
            r#"DELETE FROM acceptance_forms WHERE exam_id = $1"#,
            r#"DELETE FROM exam_enrollments WHERE exam_id = $1"#,
            r#"DELETE FROM exam_questions WHERE exam_id = $1"#,
            r#"DELETE FROM exams WHERE id = $1"#,
        ] {
            sqlx::query(stmt).bind(exam_id).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!(%exam_id, "Exam deleted with all owned records");
        Ok(())
    }

    pub async fn get_questions(&self, exam_id: Uuid) -> Result<Vec<ExamQuestion>> {
        let questions = sqlx::query_as::<_, ExamQuestion>(
            r#"SELECT * FROM exam_questions WHERE exam_id = $1 ORDER BY position, created_at"#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    pub async fn enroll(&self, student_id: Uuid, exam_id: Uuid) -> Result<ExamEnrollment> {
        let exam = self.get_exam(exam_id).await?;
        if !exam.is_published || !exam.is_active {
            return Err(Error::Forbidden(
                "Exam is not open for enrollment".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO exam_enrollments (student_id, exam_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT uq_enrollment DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .execute(&self.pool)
        .await?;

        self.get_enrollment(student_id, exam_id)
            .await?
            .ok_or_else(|| Error::Internal("Enrollment insert did not stick".to_string()))
    }

    pub async fn get_enrollment(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<ExamEnrollment>> {
        let row = sqlx::query_as::<_, ExamEnrollment>(
            r#"SELECT * FROM exam_enrollments WHERE student_id = $1 AND exam_id = $2"#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn accept_terms(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
        payload: AcceptTermsPayload,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AcceptanceForm> {
        let enrollment = self
            .get_enrollment(student_id, exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Not enrolled for this exam".to_string()))?;

        let accepted =
            payload.rules_accepted && payload.honor_code_accepted && payload.privacy_accepted;
        if !accepted {
            return Err(Error::BadRequest(
                "All terms must be accepted to proceed".to_string(),
            ));
        }

        let form = sqlx::query_as::<_, AcceptanceForm>(
            r#"
            INSERT INTO acceptance_forms (
                student_id, exam_id, enrollment_id, accepted,
                rules_accepted, honor_code_accepted, privacy_accepted,
                acceptance_ip, user_agent
            ) VALUES ($1, $2, $3, TRUE, $4, $5, $6, $7, $8)
            ON CONFLICT ON CONSTRAINT uq_acceptance DO UPDATE SET
                accepted = TRUE,
                rules_accepted = EXCLUDED.rules_accepted,
                honor_code_accepted = EXCLUDED.honor_code_accepted,
                privacy_accepted = EXCLUDED.privacy_accepted,
                acceptance_ip = EXCLUDED.acceptance_ip,
                user_agent = EXCLUDED.user_agent,
                accepted_at = NOW()
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(enrollment.id)
        .bind(payload.rules_accepted)
        .bind(payload.honor_code_accepted)
        .bind(payload.privacy_accepted)
        .bind(ip)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(form)
    }

    pub async fn get_acceptance(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<AcceptanceForm>> {
        let row = sqlx::query_as::<_, AcceptanceForm>(
            r#"SELECT * FROM acceptance_forms WHERE student_id = $1 AND exam_id = $2"#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn result_for_student(&self, student_id: Uuid, exam_id: Uuid) -> Result<ExamResult> {
        let result = sqlx::query_as::<_, ExamResult>(
            r#"SELECT * FROM exam_results WHERE student_id = $1 AND exam_id = $2"#,
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }

    pub async fn results_for_exam(
        &self,
        exam_id: Uuid,
        examiner_id: Uuid,
    ) -> Result<Vec<ExamResult>> {
        self.owned_exam(exam_id, examiner_id).await?;
        let results = sqlx::query_as::<_, ExamResult>(
            r#"SELECT * FROM exam_results WHERE exam_id = $1 ORDER BY submitted_at DESC"#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    pub async fn review_result(
        &self,
        result_id: Uuid,
        examiner_id: Uuid,
        remarks: String,
    ) -> Result<ExamResult> {
        let result = sqlx::query_as::<_, ExamResult>(
            r#"
            UPDATE exam_results r
            SET reviewed_by = $2, reviewed_at = NOW(), remarks = $3
            FROM exams e
            WHERE r.id = $1 AND r.exam_id = e.id AND e.examiner_id = $2
            RETURNING r.*
            "#,
        )
        .bind(result_id)
        .bind(examiner_id)
        .bind(remarks)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }
}
