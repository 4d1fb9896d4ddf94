//! Interactive code runner ("playground")
//!
//! Executes arbitrary user code against a single input under fixed small
//! limits, bypassing the judging queue.

use crate::audit::AuditEvent;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserAction};
use crate::sandbox::{Language, RunRequest, SandboxOutcome};
use crate::services::rate_limit;
use crate::state::AppState;

/// Playground service
pub struct PlaygroundService;

impl PlaygroundService {
    pub async fn run(
        state: &AppState,
        user: &User,
        language: &str,
        code: &str,
        stdin: &str,
    ) -> AppResult<SandboxOutcome> {
        state.audit().record(
            AuditEvent::new(
                "playground_request",
                serde_json::json!({
                    "language": language,
                    "code_length": code.len(),
                    "input_length": stdin.len(),
                }),
            )
            .for_user(user.id, &user.email),
        );

        if Language::from_tag(language).is_none() {
            return Err(AppError::Validation(format!(
                "Unsupported language: {language}"
            )));
        }

        rate_limit::acquire(
            state.repo(),
            user,
            UserAction::Playground,
            state.config().rate_limit.playground_cooldown_sec,
        )
        .await?;

        let playground = &state.config().playground;
        let request = RunRequest::new(
            code,
            language,
            playground.time_limit_sec,
            playground.memory_limit_mb,
            format!("ide-{}", user.id),
        )
        .with_stdin(stdin);

        let outcome = state.engine().run(request).await;

        state.audit().record(
            AuditEvent::new(
                "playground_result",
                serde_json::json!({
                    "language": language,
                    "sandbox_status": outcome.status,
                    "exit_code": outcome.exit_code,
                    "execution_time_ms": outcome.execution_time_ms,
                    "memory_used_kb": outcome.peak_memory_kb,
                }),
            )
            .for_user(user.id, &user.email),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NoopAuditSink;
    use crate::judge::{JudgeContext, JudgeQueue};
    use crate::sandbox::SandboxStatus;
    use crate::test_utils::{
        InMemoryRepository, ScriptedEngine, fixture_catalogue, outcome, test_config, test_user,
    };
    use std::sync::Arc;

    async fn state_with_engine(
        repo: Arc<InMemoryRepository>,
        engine: Arc<ScriptedEngine>,
    ) -> AppState {
        let catalogue = fixture_catalogue().await;
        let queue = JudgeQueue::new(
            1,
            16,
            JudgeContext {
                repo: repo.clone(),
                catalogue: catalogue.clone(),
                engine: engine.clone(),
            },
        );
        AppState::new(
            test_config(),
            repo,
            catalogue,
            engine,
            queue,
            Arc::new(NoopAuditSink),
        )
    }

    #[tokio::test]
    async fn runs_code_and_returns_the_outcome() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::with_outcomes(vec![outcome(
            SandboxStatus::Success,
            0,
            Some("hello\n"),
            None,
        )]));
        let state = state_with_engine(repo.clone(), engine.clone()).await;
        let user = repo.user(1).unwrap();

        let result = PlaygroundService::run(&state, &user, "python", "print('hello')", "")
            .await
            .unwrap();
        assert_eq!(result.status, SandboxStatus::Success);
        assert_eq!(result.stdout.as_deref(), Some("hello\n"));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn rate_limited_run_never_reaches_the_engine() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::with_outcomes(vec![outcome(
            SandboxStatus::Success,
            0,
            None,
            None,
        )]));
        let state = state_with_engine(repo.clone(), engine.clone()).await;
        let user = repo.user(1).unwrap();

        PlaygroundService::run(&state, &user, "python", "x=1", "")
            .await
            .unwrap();
        let err = PlaygroundService::run(&state, &user, "python", "x=1", "")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateLimited { .. }));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn cooldown_is_claimed_even_when_the_run_fails() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        // Engine reports an internal failure; the slot must stay claimed
        let engine = Arc::new(ScriptedEngine::empty());
        let state = state_with_engine(repo.clone(), engine).await;
        let user = repo.user(1).unwrap();

        let result = PlaygroundService::run(&state, &user, "python", "x=1", "")
            .await
            .unwrap();
        assert_eq!(result.status, SandboxStatus::InternalError);
        assert!(repo.user(1).unwrap().last_playground_at.is_some());
    }

    #[tokio::test]
    async fn unknown_language_is_rejected_before_the_rate_limit() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::empty());
        let state = state_with_engine(repo.clone(), engine).await;
        let user = repo.user(1).unwrap();

        let err = PlaygroundService::run(&state, &user, "cobol", "x", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.user(1).unwrap().last_playground_at.is_none());
    }
}
