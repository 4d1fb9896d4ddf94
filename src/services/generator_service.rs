//! Sample test-case generation

use crate::audit::AuditEvent;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserAction};
use crate::sandbox::generator::{self, GeneratedSample};
use crate::services::rate_limit;
use crate::state::AppState;

/// Generator service
pub struct GeneratorService;

impl GeneratorService {
    /// Run the problem's generator and return a fresh sample test case
    pub async fn generate_sample(
        state: &AppState,
        user: &User,
        contest_id: &str,
        problem_id: &str,
    ) -> AppResult<GeneratedSample> {
        state.audit().record(
            AuditEvent::new(
                "generator_request",
                serde_json::json!({"contest_id": contest_id, "problem_id": problem_id}),
            )
            .for_user(user.id, &user.email),
        );

        let problem = state
            .catalogue()
            .get_problem(contest_id, problem_id)
            .ok_or_else(|| AppError::NotFound("Problem not found".to_string()))?;

        if !problem.generator_available() {
            return Err(AppError::NotFound(
                "Test case generator not available for this problem.".to_string(),
            ));
        }

        let cooldown_sec = problem
            .generator_cooldown_sec
            .unwrap_or(state.config().rate_limit.generator_cooldown_sec);
        if let Err(e) =
            rate_limit::acquire(state.repo(), user, UserAction::Generation, cooldown_sec).await
        {
            if let AppError::RateLimited { wait_seconds } = &e {
                state.audit().record(
                    AuditEvent::new(
                        "generator_rate_limited",
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

        let sample = generator::run_generator(state.engine(), &problem, "gen").await;

        state.audit().record(
            AuditEvent::new(
                if sample.is_success() {
                    "generator_result"
                } else {
                    "generator_failed"
                },
                serde_json::json!({
                    "contest_id": contest_id,
                    "problem_id": problem_id,
                    "execution_time_ms": sample.execution_time_ms,
                    "memory_used_kb": sample.peak_memory_kb,
                    "has_input": sample.input.is_some(),
                    "has_output": sample.expected_output.is_some(),
                    "error": sample.error,
                }),
            )
            .for_user(user.id, &user.email),
        );

        Ok(sample)
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
    async fn returns_input_and_expected_output_streams() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::with_outcomes(vec![outcome(
            SandboxStatus::Success,
            0,
            Some("8 9\n"),
            Some("17\n"),
        )]));
        let state = state_with_engine(repo.clone(), engine).await;
        let user = repo.user(1).unwrap();

        let sample = GeneratorService::generate_sample(&state, &user, "Contest1", "sum")
            .await
            .unwrap();
        assert!(sample.is_success());
        assert_eq!(sample.input.as_deref(), Some("8 9\n"));
        assert_eq!(sample.expected_output.as_deref(), Some("17\n"));
    }

    #[tokio::test]
    async fn unknown_problem_is_not_found() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::empty());
        let state = state_with_engine(repo.clone(), engine).await;
        let user = repo.user(1).unwrap();

        let err = GeneratorService::generate_sample(&state, &user, "Contest1", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn generation_is_rate_limited_per_user() {
        let repo = Arc::new(InMemoryRepository::with_user(test_user(1, "a@b.c")));
        let engine = Arc::new(ScriptedEngine::with_outcomes(vec![outcome(
            SandboxStatus::Success,
            0,
            Some("1 2\n"),
            Some("3\n"),
        )]));
        let state = state_with_engine(repo.clone(), engine.clone()).await;
        let user = repo.user(1).unwrap();

        GeneratorService::generate_sample(&state, &user, "Contest1", "sum")
            .await
            .unwrap();
        let err = GeneratorService::generate_sample(&state, &user, "Contest1", "sum")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
        assert_eq!(engine.calls(), 1);
    }
}
