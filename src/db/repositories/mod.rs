//! Repository interface and implementations
//!
//! Pool workers and intake depend on this trait, not on the concrete
//! store. All operations are safe to call concurrently.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewSubmission, Submission, SubmissionStatus, TestCaseResult, User, UserAction};

pub use postgres::PgRepository;

/// Outcome of a conditional rate-timestamp update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSlot {
    /// The timestamp was advanced; the caller may proceed
    Granted,
    /// The cooldown has not elapsed; `last_at` is the stored timestamp
    Busy { last_at: DateTime<Utc> },
}

/// Opaque persistence interface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert a new submission in PENDING state and return it
    async fn insert_pending_submission(&self, new: NewSubmission) -> AppResult<Submission>;

    async fn get_submission(&self, id: Uuid) -> AppResult<Option<Submission>>;

    /// Persist status and the full result list in one atomic write
    async fn update_status_and_results(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        results: Vec<TestCaseResult>,
    ) -> AppResult<()>;

    async fn list_submissions_by_owner(&self, submitter_id: i64) -> AppResult<Vec<Submission>>;

    async fn list_submissions_by_owner_and_contest(
        &self,
        submitter_id: i64,
        contest_id: String,
    ) -> AppResult<Vec<Submission>>;

    async fn get_user_by_email(&self, email: String) -> AppResult<Option<User>>;

    /// Compare-and-set of the per-action timestamp: advances `last_*_at`
    /// to `now` only if the stored value is older than the cooldown.
    /// This single conditional write is what makes the rate limit safe
    /// under concurrency.
    async fn update_user_rate_timestamp(
        &self,
        user_id: i64,
        action: UserAction,
        now: DateTime<Utc>,
        cooldown_sec: u64,
    ) -> AppResult<RateSlot>;
}
