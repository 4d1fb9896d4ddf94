//! Per-submission judging
//!
//! The state machine a worker drives for one dequeued submission id:
//! fetch, drop if already terminal, mark RUNNING, look up the problem,
//! judge test cases in lexicographic order, stop at the first
//! non-accepted result, persist the terminal verdict with all results.

use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use crate::catalogue::Catalogue;
use crate::constants::OUTPUT_EXCERPT_BYTES;
use crate::db::Repository;
use crate::error::AppResult;
use crate::models::{ComparatorMode, Problem, SubmissionStatus, TestCase, TestCaseResult};
use crate::sandbox::comparator::{self, ComparatorVerdict};
use crate::sandbox::{RunRequest, SandboxRunner, SandboxStatus};

/// Everything a worker needs to judge submissions
#[derive(Clone)]
pub struct JudgeContext {
    pub repo: Arc<dyn Repository>,
    pub catalogue: Arc<Catalogue>,
    pub engine: Arc<dyn SandboxRunner>,
}

/// Judge one submission to a terminal status.
///
/// Returns an error only when persistence fails; the caller is
/// responsible for the best-effort INTERNAL_ERROR write in that case.
pub(crate) async fn process_submission(ctx: &JudgeContext, submission_id: Uuid) -> AppResult<()> {
    let Some(submission) = ctx.repo.get_submission(submission_id).await? else {
        tracing::warn!(submission_id = %submission_id, "Submission not found; dropping");
        return Ok(());
    };

    // Re-delivered ids must not re-judge a finished submission
    if submission.status.is_terminal() {
        tracing::debug!(
            submission_id = %submission_id,
            status = %submission.status,
            "Submission already terminal; dropping"
        );
        return Ok(());
    }

    ctx.repo
        .update_status_and_results(submission_id, SubmissionStatus::Running, Vec::new())
        .await?;

    let Some(problem) = ctx
        .catalogue
        .get_problem(&submission.contest_id, &submission.problem_id)
    else {
        tracing::error!(
            submission_id = %submission_id,
            contest_id = %submission.contest_id,
            problem_id = %submission.problem_id,
            "Problem definition not found"
        );
        ctx.repo
            .update_status_and_results(
                submission_id,
                SubmissionStatus::InternalError,
                vec![TestCaseResult::internal(
                    "Setup",
                    "Problem definition not found",
                )],
            )
            .await?;
        return Ok(());
    };

    let mut results: Vec<TestCaseResult> = Vec::new();
    let mut overall_status = SubmissionStatus::Accepted;

    // The catalogue sorts test cases by name; the iteration order is part
    // of the contract
    for test_case in &problem.test_cases {
        let result = judge_test_case(ctx, submission_id, &submission.code, &submission.language, &problem, test_case)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(
                    submission_id = %submission_id,
                    test_case = %test_case.name,
                    error = %format!("{e:#}"),
                    "Judge error on test case"
                );
                TestCaseResult::internal(&test_case.name, format!("Executor error: {e}"))
            });

        let status = result.status;
        results.push(result);

        if status != SubmissionStatus::Accepted {
            overall_status = status;
            break;
        }
    }

    ctx.repo
        .update_status_and_results(submission_id, overall_status, results)
        .await?;

    tracing::info!(
        submission_id = %submission_id,
        status = %overall_status,
        "Submission judged"
    );
    Ok(())
}

/// Run one test case and map the engine outcome to a per-test result
async fn judge_test_case(
    ctx: &JudgeContext,
    submission_id: Uuid,
    code: &str,
    language: &str,
    problem: &Problem,
    test_case: &TestCase,
) -> AppResult<TestCaseResult> {
    let unit_prefix = short_unit_prefix("sub", submission_id);

    let mut request = RunRequest::new(
        code,
        language,
        problem.time_limit_sec,
        problem.memory_limit_mb,
        &unit_prefix,
    );
    if let Some(input) = &test_case.input {
        request = request.with_stdin(input.clone());
    }

    let outcome = ctx.engine.run(request).await;

    let result = match outcome.status {
        SandboxStatus::CompilationError => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::CompilationError,
            stdout: None,
            stderr: outcome.compilation_stderr,
            execution_time_ms: None,
            memory_used_kb: None,
        },
        SandboxStatus::Timeout => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::TimeLimitExceeded,
            stdout: None,
            stderr: None,
            execution_time_ms: Some(outcome.execution_time_ms),
            memory_used_kb: Some(outcome.peak_memory_kb),
        },
        SandboxStatus::Oom => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::MemoryLimitExceeded,
            stdout: None,
            stderr: None,
            execution_time_ms: Some(outcome.execution_time_ms),
            memory_used_kb: Some(outcome.peak_memory_kb),
        },
        SandboxStatus::RuntimeError => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::RuntimeError,
            stdout: None,
            stderr: outcome.stderr,
            execution_time_ms: Some(outcome.execution_time_ms),
            memory_used_kb: Some(outcome.peak_memory_kb),
        },
        SandboxStatus::InternalError => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::InternalError,
            stdout: None,
            stderr: Some(
                outcome
                    .stderr
                    .unwrap_or_else(|| "Unknown internal error in sandbox engine.".to_string()),
            ),
            execution_time_ms: None,
            memory_used_kb: None,
        },
        SandboxStatus::Success if outcome.exit_code != 0 => TestCaseResult {
            test_case_name: test_case.name.clone(),
            status: SubmissionStatus::RuntimeError,
            stdout: None,
            stderr: outcome.stderr,
            execution_time_ms: Some(outcome.execution_time_ms),
            memory_used_kb: Some(outcome.peak_memory_kb),
        },
        SandboxStatus::Success => {
            let full_stdout = outcome.stdout.clone().unwrap_or_default();

            let verdict = match problem.comparator {
                ComparatorMode::Diff => {
                    let expected = test_case.expected_output.as_deref().unwrap_or("");
                    if comparator::outputs_match(&full_stdout, expected) {
                        ComparatorVerdict::Accepted
                    } else {
                        ComparatorVerdict::WrongAnswer
                    }
                }
                ComparatorMode::Custom => match &problem.validator {
                    Some(validator) => {
                        comparator::run_custom_validator(
                            ctx.engine.as_ref(),
                            validator,
                            test_case.input.as_deref().unwrap_or(""),
                            &full_stdout,
                            test_case.expected_output.as_deref().unwrap_or(""),
                            &short_unit_prefix("val", submission_id),
                        )
                        .await
                    }
                    None => {
                        return Err(anyhow!(
                            "Problem {} uses a custom comparator but ships no validator",
                            problem.id
                        )
                        .into());
                    }
                },
            };

            match verdict {
                ComparatorVerdict::Accepted => TestCaseResult {
                    test_case_name: test_case.name.clone(),
                    status: SubmissionStatus::Accepted,
                    stdout: None,
                    stderr: outcome.stderr,
                    execution_time_ms: Some(outcome.execution_time_ms),
                    memory_used_kb: Some(outcome.peak_memory_kb),
                },
                ComparatorVerdict::WrongAnswer => TestCaseResult {
                    test_case_name: test_case.name.clone(),
                    status: SubmissionStatus::WrongAnswer,
                    stdout: Some(display_excerpt(&full_stdout)),
                    stderr: outcome.stderr,
                    execution_time_ms: Some(outcome.execution_time_ms),
                    memory_used_kb: Some(outcome.peak_memory_kb),
                },
                ComparatorVerdict::JudgeFailure(message) => TestCaseResult {
                    test_case_name: test_case.name.clone(),
                    status: SubmissionStatus::InternalError,
                    stdout: None,
                    stderr: Some(message),
                    execution_time_ms: Some(outcome.execution_time_ms),
                    memory_used_kb: Some(outcome.peak_memory_kb),
                },
            }
        }
    };

    Ok(result)
}

/// Stdout excerpt shown on wrong answers
fn display_excerpt(stdout: &str) -> String {
    if stdout.len() <= OUTPUT_EXCERPT_BYTES {
        return stdout.to_string();
    }
    let mut end = OUTPUT_EXCERPT_BYTES;
    while end > 0 && !stdout.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &stdout[..end])
}

/// Short per-submission prefix for systemd unit names
fn short_unit_prefix(kind: &str, submission_id: Uuid) -> String {
    let hex = submission_id.simple().to_string();
    format!("{kind}-{}", &hex[..8])
}
