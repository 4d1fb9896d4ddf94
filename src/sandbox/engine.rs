//! Sandbox engine backed by systemd scopes and bubblewrap
//!
//! Every invocation builds a fresh ephemeral working directory, runs the
//! compile phase (when the language needs one) and the execute phase each
//! inside its own transient systemd scope wrapping a bubblewrap mount
//! namespace, then collects termination cause and resource usage from the
//! scope. The working directory is owned by a `TempDir` and removed on
//! every exit path, including cancellation.
//!
//! Resource enforcement per scope:
//! - `RuntimeMaxSec` bounds wall-clock time (2x the CPU limit plus a
//!   margin, so a blocked program and a spinning program are told apart)
//! - `LimitCPU` bounds CPU seconds, `CPUQuota` pins the run to one CPU
//! - `MemoryMax`/`MemorySwapMax=0` bound resident memory
//! - `TasksMax` bounds the process/thread count
//! - `LimitFSIZE` bounds every file the program writes, so unbounded
//!   output cannot exhaust host disk
//!
//! The bubblewrap layer exposes a read-only system image (`/usr`, `/lib`,
//! `/lib64`), a single writable workspace at `/sandbox` mapped to the
//! ephemeral host directory, and unshared user, PID and network
//! namespaces.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::constants::{OUTPUT_EXCERPT_BYTES, sandbox_paths, tools};

use super::{Language, RunRequest, SandboxOutcome, SandboxRunner, SandboxStatus};

/// Signal delivered when the kernel CPU rlimit fires
const SIGXCPU: i32 = 24;

/// Extra grace on top of the systemd wall bound before the engine kills
/// the child itself
const EXTERNAL_KILL_GRACE_SECS: u64 = 5;

/// Sandbox engine; stateless across calls
pub struct SystemdSandbox {
    config: SandboxConfig,
}

impl SystemdSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    async fn run_inner(&self, request: &RunRequest) -> Result<SandboxOutcome> {
        let Some(language) = Language::from_tag(&request.language) else {
            tracing::error!(language = %request.language, "Unknown language tag reached the engine");
            return Ok(SandboxOutcome::internal_error(format!(
                "Unsupported language: {}",
                request.language
            )));
        };
        let spec = language.spec(&self.config);

        // Setup: fresh ephemeral workspace, owned until every phase is done
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", request.unit_name))
            .tempdir()
            .context("Failed to create sandbox working directory")?;

        fs::write(workdir.path().join(spec.source_file_name()), &request.code)
            .await
            .context("Failed to write source file")?;

        if let Some(stdin) = &request.stdin {
            fs::write(workdir.path().join("input.txt"), stdin)
                .await
                .context("Failed to write input file")?;
        }

        // Compile phase, under its own fixed limits
        if let Some(compile_argv) = spec.compile.clone() {
            match self.compile(request, workdir.path(), &compile_argv).await? {
                CompilePhase::Succeeded => {}
                CompilePhase::Failed(outcome) => return Ok(outcome),
            }

            let prog = workdir.path().join("prog");
            if !fs::try_exists(&prog).await.unwrap_or(false) {
                return Ok(SandboxOutcome::internal_error(
                    "Compiler succeeded but produced no executable file",
                ));
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&prog, std::fs::Permissions::from_mode(0o755))
                    .await
                    .context("Failed to mark executable")?;
            }
        }

        // Execute phase
        let mut run_argv = spec.run.clone();
        run_argv.extend(request.extra_argv.iter().cloned());

        let stdout_path = workdir.path().join("stdout.txt");
        let stderr_path = workdir.path().join("stderr.txt");
        let stdin_path = request.stdin.as_ref().map(|_| workdir.path().join("input.txt"));

        let unit = scoped_unit_name(&request.unit_name, "exec");
        let report = self
            .run_phase(PhaseSpec {
                unit: &unit,
                cpu_limit_sec: request.time_limit_sec,
                memory_limit_mb: request.memory_limit_mb,
                argv: &run_argv,
                workdir: workdir.path(),
                extra_read_only_mounts: &request.extra_read_only_mounts,
                stdin: stdin_path.as_deref(),
                stdout: &stdout_path,
                stderr: &stderr_path,
            })
            .await?;

        tracing::debug!(
            unit = %unit,
            wall_ms = report.wall_time_ms,
            cpu_ms = report.cpu_time_ms,
            memory_kb = report.peak_memory_kb,
            "Execute phase finished"
        );

        // Collect
        let stdout = read_capped(&stdout_path, self.config.output_limit_bytes as usize).await;
        let stderr = read_capped(&stderr_path, OUTPUT_EXCERPT_BYTES).await;

        let (status, exit_code) = classify_execution(&report);
        let execution_time_ms = match status {
            // The timeout floor makes the report unambiguous even when the
            // kill raced the clock
            SandboxStatus::Timeout => report.wall_time_ms.max(request.time_limit_sec * 1000),
            _ => report.wall_time_ms,
        };

        if status == SandboxStatus::InternalError {
            tracing::error!(
                unit = %unit,
                scope_result = ?report.scope_result,
                "Sandbox scope ended in an unexpected state"
            );
        }

        Ok(SandboxOutcome {
            status,
            exit_code,
            stdout,
            stderr: match status {
                SandboxStatus::InternalError if stderr.is_none() => {
                    Some("Sandbox scope ended in an unexpected state".to_string())
                }
                _ => stderr,
            },
            compilation_stderr: None,
            execution_time_ms,
            peak_memory_kb: report.peak_memory_kb,
        })
    }

    /// Run the compile template under the configured compile limits
    async fn compile(
        &self,
        request: &RunRequest,
        workdir: &Path,
        compile_argv: &[String],
    ) -> Result<CompilePhase> {
        let compile_out = workdir.join("compile.out");
        let compile_err = workdir.join("compile.err");

        let unit = scoped_unit_name(&request.unit_name, "compile");
        let report = self
            .run_phase(PhaseSpec {
                unit: &unit,
                cpu_limit_sec: self.config.compile_time_limit_sec,
                memory_limit_mb: self.config.compile_memory_limit_mb,
                argv: compile_argv,
                workdir,
                extra_read_only_mounts: &[],
                stdin: None,
                stdout: &compile_out,
                stderr: &compile_err,
            })
            .await?;

        let diagnostics = read_capped(&compile_err, OUTPUT_EXCERPT_BYTES).await;

        let failure = match report.scope_result {
            ScopeResult::Timeout => Some(format!(
                "Compilation Timed Out.\n{}",
                diagnostics.unwrap_or_default()
            )),
            ScopeResult::OomKill => Some(format!(
                "Compilation Memory Limit Exceeded.\n{}",
                diagnostics.unwrap_or_default()
            )),
            ScopeResult::Success if report.exit_code == 0 => None,
            ScopeResult::Success => {
                Some(diagnostics.unwrap_or_else(|| "Compilation failed.".to_string()))
            }
            ScopeResult::Unknown | ScopeResult::Other(_) => {
                return Ok(CompilePhase::Failed(SandboxOutcome::internal_error(
                    "Compiler scope ended in an unexpected state",
                )));
            }
        };

        match failure {
            Some(message) => {
                let message = if message.trim().is_empty() {
                    "Compilation failed.".to_string()
                } else {
                    message
                };
                Ok(CompilePhase::Failed(SandboxOutcome::compilation_error(
                    truncate_utf8(&message, OUTPUT_EXCERPT_BYTES),
                )))
            }
            None => Ok(CompilePhase::Succeeded),
        }
    }

    /// Run one argv inside a fresh scope + bubblewrap sandbox and report
    /// how it ended
    async fn run_phase(&self, phase: PhaseSpec<'_>) -> Result<PhaseReport> {
        let wall_limit_sec = self.config.wall_limit_sec(phase.cpu_limit_sec);

        let stdin = match phase.stdin {
            Some(path) => {
                let file = fs::File::open(path)
                    .await
                    .context("Failed to open input file")?;
                Stdio::from(file.into_std().await)
            }
            None => Stdio::null(),
        };
        let stdout = fs::File::create(phase.stdout)
            .await
            .context("Failed to create stdout capture file")?;
        let stderr = fs::File::create(phase.stderr)
            .await
            .context("Failed to create stderr capture file")?;

        let mut command = Command::new(tools::SYSTEMD_RUN);
        command
            .args(self.systemd_argv(phase.unit, phase.cpu_limit_sec, phase.memory_limit_mb, wall_limit_sec))
            .arg(&self.config.bwrap_path)
            .args(self.bwrap_argv(phase.workdir, phase.extra_read_only_mounts))
            .args(phase.argv)
            .stdin(stdin)
            .stdout(Stdio::from(stdout.into_std().await))
            .stderr(Stdio::from(stderr.into_std().await))
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().context("Failed to spawn sandbox process")?;

        // systemd enforces the wall bound; this outer bound only fires if
        // the scope machinery itself wedges
        let external_bound = Duration::from_secs(wall_limit_sec + EXTERNAL_KILL_GRACE_SECS);
        let (wait_result, timed_out_externally) =
            match timeout(external_bound, child.wait()).await {
                Ok(result) => (result.context("Failed to wait for sandbox process")?, false),
                Err(_) => {
                    tracing::warn!(unit = %phase.unit, "Sandbox wall bound missed; killing process tree");
                    let _ = child.start_kill();
                    let status = child
                        .wait()
                        .await
                        .context("Failed to reap killed sandbox process")?;
                    (status, true)
                }
            };
        let wall_time_ms = started.elapsed().as_millis() as u64;

        // Usage and result must be read before the scope is released
        let (cpu_time_ms, peak_memory_kb) = self.read_scope_usage(phase.unit).await;
        let scope_result = if timed_out_externally {
            ScopeResult::Timeout
        } else {
            self.read_scope_result(phase.unit).await
        };
        self.release_scope(phase.unit).await;

        let (exit_code, signal) = exit_code_and_signal(&wait_result);

        Ok(PhaseReport {
            scope_result,
            exit_code,
            signal,
            wall_time_ms,
            cpu_time_ms,
            peak_memory_kb,
        })
    }

    fn systemd_argv(
        &self,
        unit: &str,
        cpu_limit_sec: u64,
        memory_limit_mb: u64,
        wall_limit_sec: u64,
    ) -> Vec<String> {
        vec![
            "--quiet".to_string(),
            "--scope".to_string(),
            "--user".to_string(),
            format!("--unit={unit}"),
            format!("--slice={}", self.config.slice),
            "-p".to_string(),
            format!("TasksMax={}", self.config.tasks_max),
            "-p".to_string(),
            format!("RuntimeMaxSec={wall_limit_sec}"),
            "-p".to_string(),
            "CPUQuota=100%".to_string(),
            "-p".to_string(),
            format!("MemoryMax={memory_limit_mb}M"),
            "-p".to_string(),
            "MemorySwapMax=0".to_string(),
            "-p".to_string(),
            format!("LimitCPU={cpu_limit_sec}"),
            "-p".to_string(),
            format!("LimitFSIZE={}", self.config.output_limit_bytes),
        ]
    }

    fn bwrap_argv(
        &self,
        workdir: &Path,
        extra_read_only_mounts: &[(PathBuf, String)],
    ) -> Vec<String> {
        let mut args: Vec<String> = [
            "--ro-bind", "/usr", "/usr",
            "--ro-bind", "/lib", "/lib",
            "--ro-bind", "/lib64", "/lib64",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("--bind".to_string());
        args.push(workdir.display().to_string());
        args.push(sandbox_paths::WORKSPACE.to_string());

        args.extend(
            [
                "--proc", "/proc",
                "--dev", "/dev",
                "--chdir", sandbox_paths::WORKSPACE,
                "--unshare-user",
                "--unshare-pid",
                "--unshare-net",
                "--die-with-parent",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        for (host_path, sandbox_path) in extra_read_only_mounts {
            args.push("--ro-bind".to_string());
            args.push(host_path.display().to_string());
            args.push(sandbox_path.clone());
        }

        args
    }

    /// Query the scope's Result property, which names the termination cause
    async fn read_scope_result(&self, unit: &str) -> ScopeResult {
        match self.systemctl_show(unit, "Result").await {
            Some(value) => ScopeResult::parse(&value),
            None => ScopeResult::Unknown,
        }
    }

    /// Best-effort cgroup accounting: peak RSS and CPU time of the scope.
    /// Failures yield zeros, never an error.
    async fn read_scope_usage(&self, unit: &str) -> (u64, u64) {
        let Some(cgroup) = self.systemctl_show(unit, "ControlGroup").await else {
            return (0, 0);
        };
        let base = Path::new("/sys/fs/cgroup").join(cgroup.trim_start_matches('/'));

        let peak_memory_kb = fs::read_to_string(base.join("memory.peak"))
            .await
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|bytes| bytes / 1024)
            .unwrap_or(0);

        let cpu_time_ms = fs::read_to_string(base.join("cpu.stat"))
            .await
            .ok()
            .and_then(|s| parse_cpu_stat_usec(&s))
            .map(|usec| usec / 1000)
            .unwrap_or(0);

        (cpu_time_ms, peak_memory_kb)
    }

    async fn systemctl_show(&self, unit: &str, property: &str) -> Option<String> {
        let output = Command::new(tools::SYSTEMCTL)
            .args([
                "show",
                "--user",
                &format!("{unit}.scope"),
                "-p",
                property,
                "--value",
            ])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    /// Clear the scope so failed units do not accumulate; best-effort
    async fn release_scope(&self, unit: &str) {
        for action in ["reset-failed", "stop"] {
            let _ = Command::new(tools::SYSTEMCTL)
                .args(["--user", action, &format!("{unit}.scope")])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }
    }
}

#[async_trait]
impl SandboxRunner for SystemdSandbox {
    async fn run(&self, request: RunRequest) -> SandboxOutcome {
        match self.run_inner(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    unit = %request.unit_name,
                    error = %format!("{e:#}"),
                    "Sandbox engine failure"
                );
                SandboxOutcome::internal_error(format!("Sandbox engine failure: {e:#}"))
            }
        }
    }
}

enum CompilePhase {
    Succeeded,
    Failed(SandboxOutcome),
}

struct PhaseSpec<'a> {
    unit: &'a str,
    cpu_limit_sec: u64,
    memory_limit_mb: u64,
    argv: &'a [String],
    workdir: &'a Path,
    extra_read_only_mounts: &'a [(PathBuf, String)],
    stdin: Option<&'a Path>,
    stdout: &'a Path,
    stderr: &'a Path,
}

/// How one phase's scope and child process ended
#[derive(Debug)]
pub(crate) struct PhaseReport {
    pub scope_result: ScopeResult,
    pub exit_code: i32,
    pub signal: Option<i32>,
    pub wall_time_ms: u64,
    pub cpu_time_ms: u64,
    pub peak_memory_kb: u64,
}

/// The scope's Result property
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScopeResult {
    Success,
    Timeout,
    OomKill,
    /// The property could not be read; never treated as success
    Unknown,
    Other(String),
}

impl ScopeResult {
    fn parse(value: &str) -> Self {
        match value {
            "success" => Self::Success,
            "timeout" => Self::Timeout,
            "oom-kill" => Self::OomKill,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Map a phase report to the execute-phase outcome status and exit code
pub(crate) fn classify_execution(report: &PhaseReport) -> (SandboxStatus, i32) {
    match &report.scope_result {
        ScopeResult::Timeout => (SandboxStatus::Timeout, report.exit_code),
        ScopeResult::OomKill => (SandboxStatus::Oom, report.exit_code),
        ScopeResult::Success => match report.signal {
            // A CPU-rlimit kill is a timeout, not a crash
            Some(SIGXCPU) => (SandboxStatus::Timeout, -SIGXCPU),
            Some(signal) => (SandboxStatus::RuntimeError, -signal),
            None => (SandboxStatus::Success, report.exit_code),
        },
        ScopeResult::Unknown | ScopeResult::Other(_) => {
            (SandboxStatus::InternalError, report.exit_code)
        }
    }
}

fn exit_code_and_signal(status: &std::process::ExitStatus) -> (i32, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (-signal, Some(signal));
        }
    }
    (status.code().unwrap_or(-1), None)
}

/// Unit names must be unique per phase; a stale unit would collide
fn scoped_unit_name(prefix: &str, phase: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{phase}-{}", &nonce[..8])
}

/// Read a capture file, keeping at most `cap` bytes; lossy on invalid UTF-8
async fn read_capped(path: &Path, cap: usize) -> Option<String> {
    let bytes = fs::read(path).await.ok()?;
    let text = truncate_utf8(&String::from_utf8_lossy(&bytes), cap);
    (!text.is_empty()).then_some(text)
}

/// Truncate to at most `cap` bytes without splitting a code point
fn truncate_utf8(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn parse_cpu_stat_usec(cpu_stat: &str) -> Option<u64> {
    cpu_stat
        .lines()
        .find_map(|line| line.strip_prefix("usage_usec "))
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(scope_result: ScopeResult, exit_code: i32, signal: Option<i32>) -> PhaseReport {
        PhaseReport {
            scope_result,
            exit_code,
            signal,
            wall_time_ms: 42,
            cpu_time_ms: 40,
            peak_memory_kb: 1024,
        }
    }

    #[test]
    fn scope_timeout_classifies_as_timeout() {
        let (status, _) = classify_execution(&report(ScopeResult::Timeout, -9, Some(9)));
        assert_eq!(status, SandboxStatus::Timeout);
    }

    #[test]
    fn oom_kill_classifies_as_oom() {
        let (status, _) = classify_execution(&report(ScopeResult::OomKill, -9, Some(9)));
        assert_eq!(status, SandboxStatus::Oom);
    }

    #[test]
    fn cpu_rlimit_kill_is_a_timeout_not_a_crash() {
        let (status, code) = classify_execution(&report(ScopeResult::Success, -24, Some(24)));
        assert_eq!(status, SandboxStatus::Timeout);
        assert_eq!(code, -24);
    }

    #[test]
    fn other_fatal_signals_are_runtime_errors() {
        let (status, code) = classify_execution(&report(ScopeResult::Success, -11, Some(11)));
        assert_eq!(status, SandboxStatus::RuntimeError);
        assert_eq!(code, -11);
    }

    #[test]
    fn normal_exit_is_success_with_its_code() {
        let (status, code) = classify_execution(&report(ScopeResult::Success, 3, None));
        assert_eq!(status, SandboxStatus::Success);
        assert_eq!(code, 3);

        let (status, code) = classify_execution(&report(ScopeResult::Success, 0, None));
        assert_eq!(status, SandboxStatus::Success);
        assert_eq!(code, 0);
    }

    #[test]
    fn unreadable_scope_result_is_never_success() {
        let (status, _) = classify_execution(&report(ScopeResult::Unknown, 0, None));
        assert_eq!(status, SandboxStatus::InternalError);

        let (status, _) =
            classify_execution(&report(ScopeResult::Other("resources".to_string()), 0, None));
        assert_eq!(status, SandboxStatus::InternalError);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf8("abcdef", 4), "abcd");
        assert_eq!(truncate_utf8("abc", 8), "abc");
        // 'é' is two bytes; cutting inside it must back off
        let text = "aé";
        assert_eq!(truncate_utf8(text, 2), "a");
    }

    #[test]
    fn cpu_stat_parsing_reads_usage_usec() {
        let stat = "usage_usec 123456\nuser_usec 100000\nsystem_usec 23456\n";
        assert_eq!(parse_cpu_stat_usec(stat), Some(123456));
        assert_eq!(parse_cpu_stat_usec("nr_periods 0\n"), None);
    }
}
