//! Test-case generator runner
//!
//! Runs a problem's generator program in the sandbox with no stdin. By
//! convention the generator writes the fresh test input to stdout and the
//! expected output to stderr; the two streams are returned separately.

use crate::models::Problem;

use super::{RunRequest, SandboxRunner, SandboxStatus};

/// Result of one generator run
#[derive(Debug, Clone, serde::Serialize)]
pub struct GeneratedSample {
    pub input: Option<String>,
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub peak_memory_kb: u64,
}

impl GeneratedSample {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: String) -> Self {
        Self {
            input: None,
            expected_output: None,
            error: Some(error),
            execution_time_ms: 0,
            peak_memory_kb: 0,
        }
    }
}

/// Run the problem's generator under its own limits
pub async fn run_generator(
    engine: &dyn SandboxRunner,
    problem: &Problem,
    unit_name: &str,
) -> GeneratedSample {
    let Some(generator) = &problem.generator else {
        return GeneratedSample::failed(
            "Generator program not found in problem definition.".to_string(),
        );
    };

    let request = RunRequest::new(
        generator.code.clone(),
        generator.language.clone(),
        generator.time_limit_sec,
        generator.memory_limit_mb,
        unit_name,
    );
    let outcome = engine.run(request).await;

    let error = match outcome.status {
        SandboxStatus::CompilationError => Some(format!(
            "Generator {}",
            outcome
                .compilation_stderr
                .as_deref()
                .unwrap_or("compilation failed.")
        )),
        SandboxStatus::Success if outcome.exit_code != 0 => Some(format!(
            "Generator exited with error code {}. Detail: {}",
            outcome.exit_code,
            outcome.stderr.as_deref().unwrap_or("No error output.")
        )),
        SandboxStatus::Success => None,
        status => Some(format!(
            "Generator sandbox failed to execute. Status: {status:?}."
        )),
    };

    GeneratedSample {
        input: outcome.stdout,
        expected_output: outcome.stderr,
        error,
        execution_time_ms: outcome.execution_time_ms,
        peak_memory_kb: outcome.peak_memory_kb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparatorMode, GeneratorSpec, Problem};
    use crate::sandbox::{SandboxOutcome, SandboxRunner};
    use async_trait::async_trait;

    struct FixedEngine(SandboxOutcome);

    #[async_trait]
    impl SandboxRunner for FixedEngine {
        async fn run(&self, _request: crate::sandbox::RunRequest) -> SandboxOutcome {
            self.0.clone()
        }
    }

    fn problem(generator: Option<GeneratorSpec>) -> Problem {
        Problem {
            id: "p1".to_string(),
            title: "P1".to_string(),
            description_md: String::new(),
            time_limit_sec: 2,
            memory_limit_mb: 64,
            allowed_languages: vec!["python".to_string()],
            test_cases: Vec::new(),
            comparator: ComparatorMode::Diff,
            validator: None,
            generator,
            submission_cooldown_sec: None,
            generator_cooldown_sec: None,
        }
    }

    fn generator_spec() -> GeneratorSpec {
        GeneratorSpec {
            code: "print(1)".to_string(),
            language: "python".to_string(),
            time_limit_sec: 5,
            memory_limit_mb: 256,
        }
    }

    #[tokio::test]
    async fn generator_streams_are_split_into_input_and_expected_output() {
        let engine = FixedEngine(SandboxOutcome {
            status: SandboxStatus::Success,
            exit_code: 0,
            stdout: Some("3 4\n".to_string()),
            stderr: Some("7\n".to_string()),
            compilation_stderr: None,
            execution_time_ms: 12,
            peak_memory_kb: 900,
        });

        let sample = run_generator(&engine, &problem(Some(generator_spec())), "gen").await;
        assert!(sample.is_success());
        assert_eq!(sample.input.as_deref(), Some("3 4\n"));
        assert_eq!(sample.expected_output.as_deref(), Some("7\n"));
        assert_eq!(sample.execution_time_ms, 12);
    }

    #[tokio::test]
    async fn missing_generator_is_an_error() {
        let engine = FixedEngine(SandboxOutcome::internal_error("unused"));
        let sample = run_generator(&engine, &problem(None), "gen").await;
        assert!(!sample.is_success());
    }

    #[tokio::test]
    async fn nonzero_generator_exit_is_an_error() {
        let engine = FixedEngine(SandboxOutcome {
            status: SandboxStatus::Success,
            exit_code: 3,
            stdout: None,
            stderr: Some("boom".to_string()),
            compilation_stderr: None,
            execution_time_ms: 1,
            peak_memory_kb: 1,
        });
        let sample = run_generator(&engine, &problem(Some(generator_spec())), "gen").await;
        let error = sample.error.expect("error");
        assert!(error.contains("error code 3"));
        assert!(error.contains("boom"));
    }

    #[tokio::test]
    async fn generator_timeout_is_an_error() {
        let engine = FixedEngine(SandboxOutcome {
            status: SandboxStatus::Timeout,
            exit_code: -9,
            stdout: None,
            stderr: None,
            compilation_stderr: None,
            execution_time_ms: 5000,
            peak_memory_kb: 100,
        });
        let sample = run_generator(&engine, &problem(Some(generator_spec())), "gen").await;
        assert!(sample.error.expect("error").contains("Timeout"));
    }
}
