//! Sandboxed execution of untrusted programs
//!
//! One engine call compiles (when the language requires it) and runs a
//! single program under enforced CPU, wall-clock, memory, task-count,
//! file-size and network isolation, and reports the termination cause
//! together with measured resource usage.

pub mod comparator;
pub mod engine;
pub mod generator;
pub mod languages;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

pub use engine::SystemdSandbox;
pub use languages::{Language, LanguageSpec};

/// Termination cause of one sandboxed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    /// The program ran to completion (its exit code may still be non-zero)
    Success,
    /// The compile phase failed; `compilation_stderr` explains why
    CompilationError,
    /// CPU or wall-clock limit exceeded
    Timeout,
    /// Killed by the memory controller
    Oom,
    /// The sandbox itself failed to run the program
    RuntimeError,
    /// Engine-level failure (setup, collection, unknown language)
    InternalError,
}

/// Structured result of one engine invocation
#[derive(Debug, Clone, Serialize)]
pub struct SandboxOutcome {
    pub status: SandboxStatus,
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compilation_stderr: Option<String>,
    /// Wall-clock milliseconds of the user program, excluding sandbox
    /// setup and teardown
    pub execution_time_ms: u64,
    /// Peak resident set size of the program tree, in KiB
    pub peak_memory_kb: u64,
}

impl SandboxOutcome {
    /// Engine-level failure carrying a descriptive message
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: SandboxStatus::InternalError,
            exit_code: -1,
            stdout: None,
            stderr: Some(message.into()),
            compilation_stderr: None,
            execution_time_ms: 0,
            peak_memory_kb: 0,
        }
    }

    /// Compile-phase failure; the message is already truncated
    pub fn compilation_error(compilation_stderr: String) -> Self {
        Self {
            status: SandboxStatus::CompilationError,
            exit_code: -1,
            stdout: None,
            stderr: None,
            compilation_stderr: Some(compilation_stderr),
            execution_time_ms: 0,
            peak_memory_kb: 0,
        }
    }
}

/// One engine invocation
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub code: String,
    pub language: String,
    pub stdin: Option<String>,
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
    /// Prefix for the systemd unit names of this invocation
    pub unit_name: String,
    /// Host files mounted read-only at fixed sandbox paths (validators)
    pub extra_read_only_mounts: Vec<(PathBuf, String)>,
    /// Arguments appended to the run command (validators)
    pub extra_argv: Vec<String>,
}

impl RunRequest {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        time_limit_sec: u64,
        memory_limit_mb: u64,
        unit_name: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            stdin: None,
            time_limit_sec,
            memory_limit_mb,
            unit_name: unit_name.into(),
            extra_read_only_mounts: Vec::new(),
            extra_argv: Vec::new(),
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Seam between the pipeline and the concrete engine. Implementations
/// never return errors; every failure mode is a `SandboxOutcome` status.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, request: RunRequest) -> SandboxOutcome;
}
