//! Submission model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a submission. The serialized strings are the
/// canonical external identifiers and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    InternalError,
}

impl SubmissionStatus {
    /// Get status as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Accepted => "ACCEPTED",
            Self::WrongAnswer => "WRONG_ANSWER",
            Self::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Self::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Self::RuntimeError => "RUNTIME_ERROR",
            Self::CompilationError => "COMPILATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Parse status from its wire string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "ACCEPTED" => Some(Self::Accepted),
            "WRONG_ANSWER" => Some(Self::WrongAnswer),
            "TIME_LIMIT_EXCEEDED" => Some(Self::TimeLimitExceeded),
            "MEMORY_LIMIT_EXCEEDED" => Some(Self::MemoryLimitExceeded),
            "RUNTIME_ERROR" => Some(Self::RuntimeError),
            "COMPILATION_ERROR" => Some(Self::CompilationError),
            "INTERNAL_ERROR" => Some(Self::InternalError),
            _ => None,
        }
    }

    /// A terminal submission is never re-judged
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one test case, persisted in submission order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_name: String,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_kb: Option<u64>,
}

impl TestCaseResult {
    /// Synthetic result describing a failure outside any test case
    pub fn internal(name: &str, message: impl Into<String>) -> Self {
        Self {
            test_case_name: name.to_string(),
            status: SubmissionStatus::InternalError,
            stdout: None,
            stderr: Some(message.into()),
            execution_time_ms: None,
            memory_used_kb: None,
        }
    }
}

/// Submission domain model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub problem_id: String,
    pub contest_id: String,
    pub language: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub submitter_id: i64,
    pub status: SubmissionStatus,
    pub results: Vec<TestCaseResult>,
    pub submitted_at: DateTime<Utc>,
}

/// Fields required to insert a new PENDING submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub problem_id: String,
    pub contest_id: String,
    pub language: String,
    pub code: String,
    pub submitter_id: i64,
}

/// Listing/intake view of a submission, without code or results
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionInfo {
    pub id: Uuid,
    pub problem_id: String,
    pub contest_id: String,
    pub user_email: String,
    pub language: String,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionInfo {
    pub fn from_submission(submission: &Submission, user_email: &str) -> Self {
        Self {
            id: submission.id,
            problem_id: submission.problem_id.clone(),
            contest_id: submission.contest_id.clone(),
            user_email: user_email.to_string(),
            language: submission.language.clone(),
            status: submission.status,
            submitted_at: submission.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_strings_round_trip() {
        for s in [
            SubmissionStatus::Pending,
            SubmissionStatus::Running,
            SubmissionStatus::Accepted,
            SubmissionStatus::WrongAnswer,
            SubmissionStatus::TimeLimitExceeded,
            SubmissionStatus::MemoryLimitExceeded,
            SubmissionStatus::RuntimeError,
            SubmissionStatus::CompilationError,
            SubmissionStatus::InternalError,
        ] {
            assert_eq!(SubmissionStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(SubmissionStatus::from_str("JUDGING"), None);
    }

    #[test]
    fn only_pending_and_running_are_non_terminal() {
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(!SubmissionStatus::Running.is_terminal());
        assert!(SubmissionStatus::Accepted.is_terminal());
        assert!(SubmissionStatus::InternalError.is_terminal());
    }

    #[test]
    fn test_case_result_omits_empty_fields_in_json() {
        let result = TestCaseResult {
            test_case_name: "01".to_string(),
            status: SubmissionStatus::Accepted,
            stdout: None,
            stderr: None,
            execution_time_ms: Some(12),
            memory_used_kb: Some(640),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"ACCEPTED\""));
        assert!(!json.contains("stdout"));

        let back: TestCaseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, SubmissionStatus::Accepted);
        assert_eq!(back.execution_time_ms, Some(12));
    }
}
