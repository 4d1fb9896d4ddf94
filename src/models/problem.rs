//! Problem and contest models
//!
//! Problems are loaded from the read-only catalogue and shared by all
//! workers; nothing here is persisted to the database.

use serde::{Deserialize, Serialize};

/// A single named test case. Input and expected output are both optional:
/// a generator-backed problem may ship cases with no stored output, and an
/// input-less problem has cases with no input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: Option<String>,
    pub expected_output: Option<String>,
}

impl TestCase {
    /// Sample cases are shown to contestants; hidden cases are not.
    pub fn is_sample(&self) -> bool {
        self.name.starts_with("sample")
    }
}

/// How a user's output is judged against the expected output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparatorMode {
    /// Whitespace-tolerant line comparison
    Diff,
    /// Problem-supplied validator program decides
    Custom,
}

impl Default for ComparatorMode {
    fn default() -> Self {
        Self::Diff
    }
}

/// Validator program for `ComparatorMode::Custom` problems
#[derive(Debug, Clone)]
pub struct ValidatorSpec {
    pub code: String,
    pub language: String,
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
}

/// Generator program producing fresh sample test cases
#[derive(Debug, Clone)]
pub struct GeneratorSpec {
    pub code: String,
    pub language: String,
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
}

/// Problem definition
///
/// `test_cases` is sorted lexicographically by name at load time; judging
/// iterates it in that order and partial results correspond 1:1 to it.
#[derive(Debug, Clone)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub description_md: String,
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
    pub allowed_languages: Vec<String>,
    pub test_cases: Vec<TestCase>,
    pub comparator: ComparatorMode,
    pub validator: Option<ValidatorSpec>,
    pub generator: Option<GeneratorSpec>,
    pub submission_cooldown_sec: Option<u64>,
    pub generator_cooldown_sec: Option<u64>,
}

impl Problem {
    /// Whether the given language tag may be submitted for this problem
    pub fn allows_language(&self, tag: &str) -> bool {
        self.allowed_languages.iter().any(|l| l == tag)
    }

    /// Whether a sample generator is available
    pub fn generator_available(&self) -> bool {
        self.generator.is_some()
    }
}

/// Contest with its nested problems
#[derive(Debug, Clone)]
pub struct Contest {
    pub id: String,
    pub title: String,
    pub description_md: String,
    pub problems: Vec<Problem>,
}

impl Contest {
    pub fn problem(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == problem_id)
    }
}

/// Abbreviated contest listing entry
#[derive(Debug, Clone, Serialize)]
pub struct ContestSummary {
    pub id: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem_with_languages(tags: &[&str]) -> Problem {
        Problem {
            id: "p1".to_string(),
            title: "P1".to_string(),
            description_md: String::new(),
            time_limit_sec: 2,
            memory_limit_mb: 64,
            allowed_languages: tags.iter().map(|t| t.to_string()).collect(),
            test_cases: Vec::new(),
            comparator: ComparatorMode::Diff,
            validator: None,
            generator: None,
            submission_cooldown_sec: None,
            generator_cooldown_sec: None,
        }
    }

    #[test]
    fn language_allowance_is_exact_match() {
        let problem = problem_with_languages(&["python", "c++"]);
        assert!(problem.allows_language("python"));
        assert!(problem.allows_language("c++"));
        assert!(!problem.allows_language("c"));
    }

    #[test]
    fn sample_cases_are_detected_by_name() {
        let tc = TestCase {
            name: "sample1".to_string(),
            input: None,
            expected_output: None,
        };
        assert!(tc.is_sample());
        let hidden = TestCase {
            name: "03_big".to_string(),
            input: None,
            expected_output: None,
        };
        assert!(!hidden.is_sample());
    }
}
