//! Shared test fixtures: a scripted sandbox engine, an in-memory
//! repository and a small on-disk catalogue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::catalogue::Catalogue;
use crate::config::{
    CatalogueConfig, Config, DatabaseConfig, JudgeConfig, PlaygroundConfig, RateLimitConfig,
    SandboxConfig,
};
use crate::constants::{
    DEFAULT_COMPILE_MEMORY_LIMIT_MB, DEFAULT_COMPILE_TIME_LIMIT_SECONDS,
    DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_TASKS_MAX, JUDGE_SLICE, WALL_CLOCK_MARGIN_SECONDS, tools,
};
use crate::db::repositories::{RateSlot, Repository};
use crate::error::{AppError, AppResult};
use crate::models::{
    NewSubmission, Submission, SubmissionStatus, TestCaseResult, User, UserAction,
};
use crate::sandbox::{RunRequest, SandboxOutcome, SandboxRunner, SandboxStatus};

/// Configuration with defaults suitable for unit tests
pub(crate) fn test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: "postgres://localhost/judgehost_test".to_string(),
            max_connections: 1,
        },
        catalogue: CatalogueConfig {
            data_dir: "server_data".into(),
        },
        judge: JudgeConfig {
            worker_count: 1,
            queue_capacity: 16,
        },
        sandbox: SandboxConfig {
            bwrap_path: tools::BWRAP.to_string(),
            python_path: tools::PYTHON3.to_string(),
            gcc_path: tools::GCC.to_string(),
            gpp_path: tools::GPP.to_string(),
            slice: JUDGE_SLICE.to_string(),
            tasks_max: DEFAULT_TASKS_MAX,
            compile_time_limit_sec: DEFAULT_COMPILE_TIME_LIMIT_SECONDS,
            compile_memory_limit_mb: DEFAULT_COMPILE_MEMORY_LIMIT_MB,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            wall_clock_margin_sec: WALL_CLOCK_MARGIN_SECONDS,
        },
        playground: PlaygroundConfig {
            time_limit_sec: 1,
            memory_limit_mb: 64,
        },
        rate_limit: RateLimitConfig {
            submission_cooldown_sec: 10,
            generator_cooldown_sec: 10,
            playground_cooldown_sec: 3,
        },
    }
}

/// One step of a scripted engine run
pub(crate) enum Script {
    Outcome(SandboxOutcome),
    Panic,
}

/// Engine double that replays a fixed script, one entry per `run` call.
/// An exhausted script yields internal errors, so a test that expects N
/// calls fails loudly on the N+1st.
pub(crate) struct ScriptedEngine {
    script: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn empty() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_outcomes(outcomes: Vec<SandboxOutcome>) -> Self {
        Self::with_script(outcomes.into_iter().map(Script::Outcome).collect())
    }

    pub fn with_script(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxRunner for ScriptedEngine {
    async fn run(&self, _request: RunRequest) -> SandboxOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Script::Outcome(outcome)) => outcome,
            Some(Script::Panic) => panic!("scripted engine panic"),
            None => SandboxOutcome::internal_error("Scripted engine exhausted"),
        }
    }
}

/// Build a sandbox outcome with the fields tests care about
pub(crate) fn outcome(
    status: SandboxStatus,
    exit_code: i32,
    stdout: Option<&str>,
    stderr: Option<&str>,
) -> SandboxOutcome {
    SandboxOutcome {
        status,
        exit_code,
        stdout: stdout.map(|s| s.to_string()),
        stderr: stderr.map(|s| s.to_string()),
        compilation_stderr: None,
        execution_time_ms: 10,
        peak_memory_kb: 512,
    }
}

pub(crate) fn pending_submission(
    id: Uuid,
    contest_id: &str,
    problem_id: &str,
    language: &str,
) -> Submission {
    Submission {
        id,
        problem_id: problem_id.to_string(),
        contest_id: contest_id.to_string(),
        language: language.to_string(),
        code: "print(input())".to_string(),
        submitter_id: 1,
        status: SubmissionStatus::Pending,
        results: Vec::new(),
        submitted_at: Utc::now(),
    }
}

pub(crate) fn test_user(id: i64, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        last_submission_at: None,
        last_generation_at: None,
        last_playground_at: None,
    }
}

/// Catalogue with one contest (`Contest1`) holding one problem (`sum`)
/// with two diff-judged test cases: `01_small` ("2 3" -> "5") and
/// `02_big` ("100 200" -> "300"). The problem allows python and c++ and
/// ships a python generator.
pub(crate) async fn fixture_catalogue() -> Arc<Catalogue> {
    let dir = tempfile::tempdir().expect("fixture tempdir");
    let problem = dir.path().join("contests/Contest1/sum");
    std::fs::create_dir_all(&problem).unwrap();
    std::fs::write(
        dir.path().join("contests/Contest1/settings.json"),
        r#"{"title": "Fixture Contest"}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("contests/Contest1/index.md"), "fixture").unwrap();
    std::fs::write(
        problem.join("settings.json"),
        r#"{
            "title": "A + B",
            "time_limit_sec": 1,
            "memory_limit_mb": 64,
            "allowed_languages": ["python", "c++"]
        }"#,
    )
    .unwrap();
    std::fs::write(problem.join("index.md"), "Add two numbers.").unwrap();
    std::fs::write(problem.join("01_small.in"), "2 3\n").unwrap();
    std::fs::write(problem.join("01_small.out"), "5\n").unwrap();
    std::fs::write(problem.join("02_big.in"), "100 200\n").unwrap();
    std::fs::write(problem.join("02_big.out"), "300\n").unwrap();
    std::fs::write(problem.join("generator.py"), "print('1 2')").unwrap();

    let catalogue = Catalogue::new(dir.path());
    catalogue.reload().await.expect("fixture catalogue load");
    // The data now lives in memory; the fixture directory may vanish
    Arc::new(catalogue)
}

/// Stateful repository double; records every status transition
#[derive(Default)]
pub(crate) struct InMemoryRepository {
    submissions: Mutex<HashMap<Uuid, Submission>>,
    users: Mutex<HashMap<i64, User>>,
    transitions: Mutex<Vec<(Uuid, SubmissionStatus)>>,
}

impl InMemoryRepository {
    pub fn with_user(user: User) -> Self {
        let repo = Self::default();
        repo.users.lock().unwrap().insert(user.id, user);
        repo
    }

    pub fn add_submission(&self, submission: Submission) {
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id, submission);
    }

    pub fn status_of(&self, id: Uuid) -> Option<SubmissionStatus> {
        self.submissions.lock().unwrap().get(&id).map(|s| s.status)
    }

    pub fn transitions_of(&self, id: Uuid) -> Vec<SubmissionStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(sub_id, _)| *sub_id == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_pending_submission(&self, new: NewSubmission) -> AppResult<Submission> {
        let submission = Submission {
            id: Uuid::new_v4(),
            problem_id: new.problem_id,
            contest_id: new.contest_id,
            language: new.language,
            code: new.code,
            submitter_id: new.submitter_id,
            status: SubmissionStatus::Pending,
            results: Vec::new(),
            submitted_at: Utc::now(),
        };
        self.add_submission(submission.clone());
        Ok(submission)
    }

    async fn get_submission(&self, id: Uuid) -> AppResult<Option<Submission>> {
        Ok(self.submissions.lock().unwrap().get(&id).cloned())
    }

    async fn update_status_and_results(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        results: Vec<TestCaseResult>,
    ) -> AppResult<()> {
        let mut submissions = self.submissions.lock().unwrap();
        let submission = submissions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))?;
        submission.status = status;
        submission.results = results;
        self.transitions.lock().unwrap().push((id, status));
        Ok(())
    }

    async fn list_submissions_by_owner(&self, submitter_id: i64) -> AppResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .submissions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.submitter_id == submitter_id)
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    async fn list_submissions_by_owner_and_contest(
        &self,
        submitter_id: i64,
        contest_id: String,
    ) -> AppResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .submissions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.submitter_id == submitter_id && s.contest_id == contest_id)
            .cloned()
            .collect();
        submissions.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(submissions)
    }

    async fn get_user_by_email(&self, email: String) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user_rate_timestamp(
        &self,
        user_id: i64,
        action: UserAction,
        now: chrono::DateTime<Utc>,
        cooldown_sec: u64,
    ) -> AppResult<RateSlot> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        if let Some(last_at) = user.last_action_at(action) {
            if last_at > now - Duration::seconds(cooldown_sec as i64) {
                return Ok(RateSlot::Busy { last_at });
            }
        }

        match action {
            UserAction::Submission => user.last_submission_at = Some(now),
            UserAction::Generation => user.last_generation_at = Some(now),
            UserAction::Playground => user.last_playground_at = Some(now),
        }
        user.updated_at = now;
        Ok(RateSlot::Granted)
    }
}
