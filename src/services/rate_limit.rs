//! Per-user action cooldowns
//!
//! The guard advances the user's per-action timestamp *before* the action
//! body runs, through a single conditional repository write. A slow action
//! therefore cannot let the same user start a second concurrent one, and
//! two racing requests cannot both pass.

use chrono::{Duration, Utc};

use crate::db::{RateSlot, Repository};
use crate::error::{AppError, AppResult};
use crate::models::{User, UserAction};

/// Claim the user's cooldown slot for one action.
///
/// On success the stored `last_*_at` equals the claimed instant. On
/// denial, returns `RateLimited` carrying the whole seconds left.
pub async fn acquire(
    repo: &dyn Repository,
    user: &User,
    action: UserAction,
    cooldown_sec: u64,
) -> AppResult<()> {
    let now = Utc::now();
    match repo
        .update_user_rate_timestamp(user.id, action, now, cooldown_sec)
        .await?
    {
        RateSlot::Granted => Ok(()),
        RateSlot::Busy { last_at } => {
            let wait_seconds = (last_at + Duration::seconds(cooldown_sec as i64) - now)
                .num_seconds()
                .max(0) as u64;
            Err(AppError::RateLimited { wait_seconds })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryRepository, test_user};

    #[tokio::test]
    async fn first_action_is_granted_and_timestamp_is_written() {
        let repo = InMemoryRepository::with_user(test_user(1, "a@b.c"));
        let user = repo.user(1).unwrap();

        acquire(&repo, &user, UserAction::Submission, 10)
            .await
            .unwrap();

        // Write-before-action: the timestamp is set even though nothing
        // else has happened yet
        assert!(repo.user(1).unwrap().last_submission_at.is_some());
    }

    #[tokio::test]
    async fn second_action_within_cooldown_is_rejected_with_remaining_seconds() {
        let repo = InMemoryRepository::with_user(test_user(1, "a@b.c"));
        let user = repo.user(1).unwrap();

        acquire(&repo, &user, UserAction::Generation, 60)
            .await
            .unwrap();
        let first_at = repo.user(1).unwrap().last_generation_at;

        let err = acquire(&repo, &user, UserAction::Generation, 60)
            .await
            .unwrap_err();
        match err {
            AppError::RateLimited { wait_seconds } => assert!(wait_seconds <= 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // The denied attempt must not move the stored timestamp
        assert_eq!(repo.user(1).unwrap().last_generation_at, first_at);
    }

    #[tokio::test]
    async fn actions_have_independent_cooldowns() {
        let repo = InMemoryRepository::with_user(test_user(1, "a@b.c"));
        let user = repo.user(1).unwrap();

        acquire(&repo, &user, UserAction::Submission, 60)
            .await
            .unwrap();
        // A submission cooldown does not block the playground
        acquire(&repo, &user, UserAction::Playground, 60)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zero_cooldown_never_rejects() {
        let repo = InMemoryRepository::with_user(test_user(1, "a@b.c"));
        let user = repo.user(1).unwrap();

        for _ in 0..3 {
            acquire(&repo, &user, UserAction::Playground, 0)
                .await
                .unwrap();
        }
    }
}
