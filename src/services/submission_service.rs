//! Submission intake and queries

use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::error::{AppError, AppResult};
use crate::models::{NewSubmission, Submission, SubmissionInfo, SubmissionStatus, TestCaseResult, User, UserAction};
use crate::services::rate_limit;
use crate::state::AppState;

/// Submission service for business logic
pub struct SubmissionService;

impl SubmissionService {
    /// Validate, rate-limit, insert PENDING and enqueue for judging.
    ///
    /// The submission is inserted only after every request-level check
    /// passes; a rejected request leaves no trace beyond an audit event.
    pub async fn submit(
        state: &AppState,
        user: &User,
        contest_id: &str,
        problem_id: &str,
        language: &str,
        code: &str,
    ) -> AppResult<SubmissionInfo> {
        state.audit().record(
            AuditEvent::new(
                "submission_request",
                serde_json::json!({
                    "contest_id": contest_id,
                    "problem_id": problem_id,
                    "language": language,
                    "code_length": code.len(),
                }),
            )
            .for_user(user.id, &user.email),
        );

        let problem = state
            .catalogue()
            .get_problem(contest_id, problem_id)
            .ok_or_else(|| AppError::NotFound("Problem not found".to_string()))?;

        if !problem.allows_language(language) {
            return Err(AppError::Validation(format!(
                "Language {language} not allowed for this problem."
            )));
        }

        let cooldown_sec = problem
            .submission_cooldown_sec
            .unwrap_or(state.config().rate_limit.submission_cooldown_sec);
        if let Err(e) =
            rate_limit::acquire(state.repo(), user, UserAction::Submission, cooldown_sec).await
        {
            if let AppError::RateLimited { wait_seconds } = &e {
                state.audit().record(
                    AuditEvent::new(
                        "submission_rate_limited",
                        serde_json::json!({
                            "contest_id": contest_id,
                            "problem_id": problem_id,
                            "wait_seconds": wait_seconds,
                        }),
                    )
                    .for_user(user.id, &user.email),
                );
            }
            return Err(e);
        }

        let submission = state
            .repo()
            .insert_pending_submission(NewSubmission {
                problem_id: problem_id.to_string(),
                contest_id: contest_id.to_string(),
                language: language.to_string(),
                code: code.to_string(),
                submitter_id: user.id,
            })
            .await?;

        if let Err(e) = state.queue().enqueue(submission.id) {
            // The record exists but will never be judged; close it out
            tracing::error!(
                submission_id = %submission.id,
                error = %e,
                "Failed to enqueue submission"
            );
            if let Err(close_err) = state
                .repo()
                .update_status_and_results(
                    submission.id,
                    SubmissionStatus::InternalError,
                    vec![TestCaseResult::internal(
                        "Setup",
                        "Submission could not be queued for judging",
                    )],
                )
                .await
            {
                tracing::error!(
                    submission_id = %submission.id,
                    error = %close_err,
                    "Failed to record internal error for unqueued submission"
                );
            }
            return Err(e);
        }

        state.audit().record(
            AuditEvent::new(
                "submission_accepted",
                serde_json::json!({
                    "submission_id": submission.id.to_string(),
                    "contest_id": contest_id,
                    "problem_id": problem_id,
                }),
            )
            .for_user(user.id, &user.email),
        );

        Ok(SubmissionInfo::from_submission(&submission, &user.email))
    }

    /// Fetch one submission with its results; owners only. A foreign id
    /// looks identical to a missing one.
    pub async fn get_submission(
        state: &AppState,
        user: &User,
        submission_id: Uuid,
    ) -> AppResult<Submission> {
        let submission = state
            .repo()
            .get_submission(submission_id)
            .await?
            .filter(|s| s.submitter_id == user.id)
            .ok_or_else(|| {
                AppError::NotFound("Submission not found or not authorized".to_string())
            })?;
        Ok(submission)
    }

    /// All of the user's submissions, newest first
    pub async fn list_submissions(state: &AppState, user: &User) -> AppResult<Vec<SubmissionInfo>> {
        let submissions = state.repo().list_submissions_by_owner(user.id).await?;
        Ok(submissions
            .iter()
            .map(|s| SubmissionInfo::from_submission(s, &user.email))
            .collect())
    }

    /// The user's submissions within one contest, oldest first
    pub async fn list_submissions_for_contest(
        state: &AppState,
        user: &User,
        contest_id: &str,
    ) -> AppResult<Vec<SubmissionInfo>> {
        let submissions = state
            .repo()
            .list_submissions_by_owner_and_contest(user.id, contest_id.to_string())
            .await?;
        Ok(submissions
            .iter()
            .map(|s| SubmissionInfo::from_submission(s, &user.email))
            .collect())
    }
}
