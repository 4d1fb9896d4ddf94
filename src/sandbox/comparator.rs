//! Output comparison
//!
//! Two modes, selected per problem: a whitespace-tolerant line diff, and a
//! problem-supplied validator program that runs in its own sandbox and
//! reports through its exit code.

use tokio::fs;

use crate::constants::sandbox_paths;
use crate::models::ValidatorSpec;

use super::{RunRequest, SandboxOutcome, SandboxRunner, SandboxStatus};

/// What the comparator decided about one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparatorVerdict {
    Accepted,
    WrongAnswer,
    /// The comparator itself failed; the submission is not at fault
    JudgeFailure(String),
}

/// Whitespace-tolerant line comparison.
///
/// Trailing whitespace on each line is ignored, trailing carriage returns
/// are stripped, and a terminal newline discrepancy is not an error.
pub fn outputs_match(user: &str, expected: &str) -> bool {
    let user_lines = user.lines().map(str::trim_end);
    let expected_lines = expected.lines().map(str::trim_end);
    user_lines.eq(expected_lines)
}

/// Run the problem's validator in a second sandbox.
///
/// The test input, the user's stdout and the expected output are mounted
/// read-only at well-known paths and passed as argv. Exit 0 means
/// accepted, exit 1 wrong answer; anything else, including abnormal
/// termination or a validator compile failure, is a judge failure.
pub async fn run_custom_validator(
    engine: &dyn SandboxRunner,
    validator: &ValidatorSpec,
    test_input: &str,
    user_output: &str,
    expected_output: &str,
    unit_name: &str,
) -> ComparatorVerdict {
    let staging = match tempfile::Builder::new().prefix("validator-").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            return ComparatorVerdict::JudgeFailure(format!(
                "Failed to stage validator files: {e}"
            ));
        }
    };

    let input_path = staging.path().join("input.txt");
    let user_out_path = staging.path().join("user.out");
    let expected_out_path = staging.path().join("expected.out");

    for (path, content) in [
        (&input_path, test_input),
        (&user_out_path, user_output),
        (&expected_out_path, expected_output),
    ] {
        if let Err(e) = fs::write(path, content).await {
            return ComparatorVerdict::JudgeFailure(format!(
                "Failed to stage validator files: {e}"
            ));
        }
    }

    let mut request = RunRequest::new(
        validator.code.clone(),
        validator.language.clone(),
        validator.time_limit_sec,
        validator.memory_limit_mb,
        unit_name,
    );
    request.extra_read_only_mounts = vec![
        (input_path, sandbox_paths::VALIDATOR_INPUT.to_string()),
        (user_out_path, sandbox_paths::VALIDATOR_USER_OUT.to_string()),
        (
            expected_out_path,
            sandbox_paths::VALIDATOR_EXPECTED_OUT.to_string(),
        ),
    ];
    request.extra_argv = vec![
        sandbox_paths::VALIDATOR_INPUT.to_string(),
        sandbox_paths::VALIDATOR_USER_OUT.to_string(),
        sandbox_paths::VALIDATOR_EXPECTED_OUT.to_string(),
    ];

    let outcome = engine.run(request).await;
    validator_verdict(&outcome)
}

/// Map a validator's sandbox outcome to a comparator verdict
pub fn validator_verdict(outcome: &SandboxOutcome) -> ComparatorVerdict {
    match outcome.status {
        SandboxStatus::Success => match outcome.exit_code {
            0 => ComparatorVerdict::Accepted,
            1 => ComparatorVerdict::WrongAnswer,
            code => ComparatorVerdict::JudgeFailure(format!(
                "Validator exited with unexpected code {code}"
            )),
        },
        SandboxStatus::CompilationError => ComparatorVerdict::JudgeFailure(format!(
            "Validator failed to compile: {}",
            outcome
                .compilation_stderr
                .as_deref()
                .unwrap_or("no diagnostics")
        )),
        status => ComparatorVerdict::JudgeFailure(format!(
            "Validator failed to execute (status: {status:?})"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_outputs_match() {
        assert!(outputs_match("1 2 3\n", "1 2 3\n"));
    }

    #[test]
    fn empty_outputs_match() {
        assert!(outputs_match("", ""));
    }

    #[test]
    fn terminal_newline_discrepancy_is_tolerated() {
        assert!(outputs_match("5", "5\n"));
        assert!(outputs_match("5\n", "5"));
    }

    #[test]
    fn trailing_whitespace_and_carriage_returns_are_ignored() {
        assert!(outputs_match("5  \t\n", "5\n"));
        assert!(outputs_match("1 2\r\n3\r\n", "1 2\n3\n"));
    }

    #[test]
    fn leading_whitespace_is_significant() {
        assert!(!outputs_match("  5\n", "5\n"));
    }

    #[test]
    fn different_values_do_not_match() {
        assert!(!outputs_match("wrong\n", "5\n"));
        assert!(!outputs_match("5\n6\n", "5\n"));
    }

    fn outcome(status: SandboxStatus, exit_code: i32) -> SandboxOutcome {
        SandboxOutcome {
            status,
            exit_code,
            stdout: None,
            stderr: None,
            compilation_stderr: None,
            execution_time_ms: 1,
            peak_memory_kb: 1,
        }
    }

    #[test]
    fn validator_exit_zero_accepts() {
        assert_eq!(
            validator_verdict(&outcome(SandboxStatus::Success, 0)),
            ComparatorVerdict::Accepted
        );
    }

    #[test]
    fn validator_exit_one_is_wrong_answer() {
        assert_eq!(
            validator_verdict(&outcome(SandboxStatus::Success, 1)),
            ComparatorVerdict::WrongAnswer
        );
    }

    #[test]
    fn validator_exit_two_or_more_is_a_judge_failure() {
        for code in [2, 3, 42] {
            assert!(matches!(
                validator_verdict(&outcome(SandboxStatus::Success, code)),
                ComparatorVerdict::JudgeFailure(_)
            ));
        }
    }

    #[test]
    fn abnormal_validator_termination_is_a_judge_failure() {
        for status in [
            SandboxStatus::Timeout,
            SandboxStatus::Oom,
            SandboxStatus::RuntimeError,
            SandboxStatus::InternalError,
        ] {
            assert!(matches!(
                validator_verdict(&outcome(status, -9)),
                ComparatorVerdict::JudgeFailure(_)
            ));
        }
    }
}
