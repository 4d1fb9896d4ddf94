//! PostgreSQL repository

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    NewSubmission, Submission, SubmissionStatus, TestCaseResult, User, UserAction,
};

use super::{RateSlot, Repository};

/// Repository backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw submission row; status and results decode in `into_submission`
#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: Uuid,
    problem_id: String,
    contest_id: String,
    language: String,
    code: String,
    submitter_id: i64,
    status: String,
    results_json: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl SubmissionRow {
    fn into_submission(self) -> Submission {
        let status = SubmissionStatus::from_str(&self.status).unwrap_or_else(|| {
            tracing::warn!(
                submission_id = %self.id,
                status = %self.status,
                "Unknown status in storage"
            );
            SubmissionStatus::InternalError
        });

        let results = match self.results_json.as_deref() {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
                tracing::error!(submission_id = %self.id, error = %e, "Malformed results_json");
                vec![TestCaseResult::internal(
                    "Results",
                    "Failed to parse stored results",
                )]
            }),
        };

        Submission {
            id: self.id,
            problem_id: self.problem_id,
            contest_id: self.contest_id,
            language: self.language,
            code: self.code,
            submitter_id: self.submitter_id,
            status,
            results,
            submitted_at: self.submitted_at,
        }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn insert_pending_submission(&self, new: NewSubmission) -> AppResult<Submission> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions
                (id, problem_id, contest_id, language, code, submitter_id, status, results_json, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, '[]', $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.problem_id)
        .bind(&new.contest_id)
        .bind(&new.language)
        .bind(&new.code)
        .bind(new.submitter_id)
        .bind(SubmissionStatus::Pending.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_submission())
    }

    async fn get_submission(&self, id: Uuid) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(r#"SELECT * FROM submissions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SubmissionRow::into_submission))
    }

    async fn update_status_and_results(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        results: Vec<TestCaseResult>,
    ) -> AppResult<()> {
        let results_json = serde_json::to_string(&results)?;

        sqlx::query(
            r#"
            UPDATE submissions
            SET status = $2, results_json = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(results_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_submissions_by_owner(&self, submitter_id: i64) -> AppResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM submissions
            WHERE submitter_id = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(submitter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubmissionRow::into_submission).collect())
    }

    async fn list_submissions_by_owner_and_contest(
        &self,
        submitter_id: i64,
        contest_id: String,
    ) -> AppResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM submissions
            WHERE submitter_id = $1 AND contest_id = $2
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(submitter_id)
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubmissionRow::into_submission).collect())
    }

    async fn get_user_by_email(&self, email: String) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user_rate_timestamp(
        &self,
        user_id: i64,
        action: UserAction,
        now: DateTime<Utc>,
        cooldown_sec: u64,
    ) -> AppResult<RateSlot> {
        let threshold = now - Duration::seconds(cooldown_sec as i64);

        // One conditional write; two concurrent requests cannot both see a
        // stale timestamp and both proceed.
        let query = match action {
            UserAction::Submission => {
                r#"
                UPDATE users SET last_submission_at = $2, updated_at = $2
                WHERE id = $1
                  AND (last_submission_at IS NULL OR last_submission_at <= $3)
                "#
            }
            UserAction::Generation => {
                r#"
                UPDATE users SET last_generation_at = $2, updated_at = $2
                WHERE id = $1
                  AND (last_generation_at IS NULL OR last_generation_at <= $3)
                "#
            }
            UserAction::Playground => {
                r#"
                UPDATE users SET last_playground_at = $2, updated_at = $2
                WHERE id = $1
                  AND (last_playground_at IS NULL OR last_playground_at <= $3)
                "#
            }
        };

        let updated = sqlx::query(query)
            .bind(user_id)
            .bind(now)
            .bind(threshold)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 1 {
            return Ok(RateSlot::Granted);
        }

        let column = match action {
            UserAction::Submission => "last_submission_at",
            UserAction::Generation => "last_generation_at",
            UserAction::Playground => "last_playground_at",
        };
        let last_at: Option<DateTime<Utc>> =
            sqlx::query_scalar(&format!("SELECT {column} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        match last_at {
            Some(last_at) => Ok(RateSlot::Busy { last_at }),
            // No row or a NULL timestamp: the conditional update should
            // have matched, so the user does not exist
            None => Err(AppError::NotFound(format!("User {user_id} not found"))),
        }
    }
}
