//! Problem catalogue
//!
//! Read-only in-memory view of all contests and problems, loaded from a
//! data directory. `reload` builds a complete new view and swaps it in
//! atomically; concurrent readers see either the old or the new view,
//! never a partial one.
//!
//! On-disk layout, one directory per contest:
//!
//! ```text
//! <data_dir>/contests/<contest-id>/
//!     settings.json            contest title
//!     index.md                 contest description
//!     <problem-id>/
//!         settings.json        limits, languages, comparator, cooldowns
//!         index.md             problem statement
//!         <case>.in            test input
//!         <case>.out           expected output
//!         validator.<ext>      custom validator program (optional)
//!         generator.<ext>      sample generator program (optional)
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::constants::{
    DEFAULT_MEMORY_LIMIT_MB, DEFAULT_TIME_LIMIT_SECONDS, catalogue_files, languages,
};
use crate::error::{AppError, AppResult};
use crate::models::problem::ContestSummary;
use crate::models::{ComparatorMode, Contest, GeneratorSpec, Problem, TestCase, ValidatorSpec};

/// Atomic snapshot of all contests
#[derive(Debug, Default)]
pub struct CatalogueData {
    contests: HashMap<String, Contest>,
}

/// Shared catalogue handle
pub struct Catalogue {
    data_dir: PathBuf,
    inner: RwLock<Arc<CatalogueData>>,
}

impl Catalogue {
    /// Create an empty catalogue rooted at the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            inner: RwLock::new(Arc::new(CatalogueData::default())),
        }
    }

    /// Load the catalogue from disk and swap it in
    pub async fn reload(&self) -> AppResult<()> {
        let data = load_catalogue(&self.data_dir)
            .await
            .map_err(AppError::Internal)?;
        let contest_count = data.contests.len();

        let mut guard = self.inner.write().expect("catalogue lock poisoned");
        *guard = Arc::new(data);
        drop(guard);

        tracing::info!(contests = contest_count, "Catalogue loaded");
        Ok(())
    }

    fn snapshot(&self) -> Arc<CatalogueData> {
        self.inner.read().expect("catalogue lock poisoned").clone()
    }

    pub fn get_contest(&self, contest_id: &str) -> Option<Contest> {
        self.snapshot().contests.get(contest_id).cloned()
    }

    pub fn get_problem(&self, contest_id: &str, problem_id: &str) -> Option<Problem> {
        self.snapshot()
            .contests
            .get(contest_id)
            .and_then(|c| c.problem(problem_id))
            .cloned()
    }

    pub fn all_contests(&self) -> Vec<ContestSummary> {
        let snapshot = self.snapshot();
        let mut contests: Vec<ContestSummary> = snapshot
            .contests
            .values()
            .map(|c| ContestSummary {
                id: c.id.clone(),
                title: c.title.clone(),
            })
            .collect();
        contests.sort_by(|a, b| a.id.cmp(&b.id));
        contests
    }
}

#[derive(Debug, Deserialize, Default)]
struct ContestSettings {
    title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProblemSettings {
    title: Option<String>,
    time_limit_sec: Option<u64>,
    memory_limit_mb: Option<u64>,
    allowed_languages: Option<Vec<String>>,
    comparator: Option<ComparatorMode>,
    validator_time_limit_sec: Option<u64>,
    validator_memory_limit_mb: Option<u64>,
    generator_time_limit_sec: Option<u64>,
    generator_memory_limit_mb: Option<u64>,
    submission_cooldown_sec: Option<u64>,
    generator_cooldown_sec: Option<u64>,
}

async fn load_catalogue(data_dir: &Path) -> Result<CatalogueData> {
    let contests_dir = data_dir.join("contests");
    let mut contests = HashMap::new();

    if !fs::try_exists(&contests_dir).await.unwrap_or(false) {
        tracing::warn!(path = %contests_dir.display(), "Contests directory not found");
        return Ok(CatalogueData { contests });
    }

    let mut entries = fs::read_dir(&contests_dir)
        .await
        .context("Failed to read contests directory")?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let contest_id = entry.file_name().to_string_lossy().to_string();
        match load_contest(&contest_id, &entry.path()).await {
            Ok(contest) => {
                contests.insert(contest_id, contest);
            }
            Err(e) => {
                tracing::warn!(contest_id = %contest_id, error = %format!("{e:#}"), "Skipping contest");
            }
        }
    }

    Ok(CatalogueData { contests })
}

async fn load_contest(contest_id: &str, contest_path: &Path) -> Result<Contest> {
    let settings: ContestSettings =
        read_settings(&contest_path.join(catalogue_files::SETTINGS)).await;
    let description_md = fs::read_to_string(contest_path.join(catalogue_files::DESCRIPTION))
        .await
        .unwrap_or_default();

    let mut problems = Vec::new();
    let mut entries = fs::read_dir(contest_path)
        .await
        .context("Failed to read contest directory")?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let problem_id = entry.file_name().to_string_lossy().to_string();
        match load_problem(&problem_id, &entry.path()).await {
            Ok(Some(problem)) => problems.push(problem),
            Ok(None) => {
                tracing::debug!(problem_id = %problem_id, "Directory is not a problem; skipping");
            }
            Err(e) => {
                tracing::warn!(problem_id = %problem_id, error = %format!("{e:#}"), "Skipping problem");
            }
        }
    }
    problems.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(Contest {
        id: contest_id.to_string(),
        title: settings.title.unwrap_or_else(|| contest_id.to_string()),
        description_md,
        problems,
    })
}

async fn load_problem(problem_id: &str, problem_path: &Path) -> Result<Option<Problem>> {
    let settings_path = problem_path.join(catalogue_files::SETTINGS);
    let description_path = problem_path.join(catalogue_files::DESCRIPTION);
    if !fs::try_exists(&settings_path).await.unwrap_or(false)
        || !fs::try_exists(&description_path).await.unwrap_or(false)
    {
        return Ok(None);
    }

    let settings: ProblemSettings = read_settings(&settings_path).await;
    let description_md = fs::read_to_string(&description_path)
        .await
        .context("Failed to read problem statement")?;

    let test_cases = load_test_cases(problem_path).await?;

    let validator = load_program(problem_path, catalogue_files::VALIDATOR_STEM)
        .await
        .map(|(code, language)| ValidatorSpec {
            code,
            language,
            time_limit_sec: settings.validator_time_limit_sec.unwrap_or(10),
            memory_limit_mb: settings.validator_memory_limit_mb.unwrap_or(256),
        });

    let generator = load_program(problem_path, catalogue_files::GENERATOR_STEM)
        .await
        .map(|(code, language)| GeneratorSpec {
            code,
            language,
            time_limit_sec: settings.generator_time_limit_sec.unwrap_or(5),
            memory_limit_mb: settings.generator_memory_limit_mb.unwrap_or(256),
        });

    let comparator = match settings.comparator {
        Some(mode) => mode,
        None if validator.is_some() => ComparatorMode::Custom,
        None => ComparatorMode::Diff,
    };

    Ok(Some(Problem {
        id: problem_id.to_string(),
        title: settings.title.unwrap_or_else(|| problem_id.to_string()),
        description_md,
        time_limit_sec: settings.time_limit_sec.unwrap_or(DEFAULT_TIME_LIMIT_SECONDS),
        memory_limit_mb: settings.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB),
        allowed_languages: settings
            .allowed_languages
            .unwrap_or_else(|| vec![languages::PYTHON.to_string(), languages::CPP.to_string()]),
        test_cases,
        comparator,
        validator,
        generator,
        submission_cooldown_sec: settings.submission_cooldown_sec,
        generator_cooldown_sec: settings.generator_cooldown_sec,
    }))
}

/// Collect `<name>.in` / `<name>.out` pairs, sorted by name. The sort
/// order is part of the judging contract.
async fn load_test_cases(problem_path: &Path) -> Result<Vec<TestCase>> {
    let mut test_cases = Vec::new();
    let mut entries = fs::read_dir(problem_path)
        .await
        .context("Failed to read problem directory")?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(catalogue_files::INPUT_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let input = fs::read_to_string(&path).await.ok();
        let expected_output = fs::read_to_string(
            path.with_extension(catalogue_files::OUTPUT_EXTENSION),
        )
        .await
        .ok();

        test_cases.push(TestCase {
            name: name.to_string(),
            input,
            expected_output,
        });
    }

    test_cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(test_cases)
}

/// Load `<stem>.<ext>` for any supported language extension, returning
/// the code together with the language tag the extension implies
async fn load_program(problem_path: &Path, stem: &str) -> Option<(String, String)> {
    for (extension, language) in [
        ("py", languages::PYTHON),
        ("c", languages::C),
        ("cpp", languages::CPP),
    ] {
        let path = problem_path.join(format!("{stem}.{extension}"));
        if let Ok(code) = fs::read_to_string(&path).await {
            return Some((code, language.to_string()));
        }
    }
    None
}

async fn read_settings<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Malformed settings file; using defaults");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn write_fixture(root: &Path) {
        let problem = root.join("contests/Contest1/sum");
        std_fs::create_dir_all(&problem).unwrap();
        std_fs::write(
            root.join("contests/Contest1/settings.json"),
            r#"{"title": "First Contest"}"#,
        )
        .unwrap();
        std_fs::write(root.join("contests/Contest1/index.md"), "# Welcome").unwrap();
        std_fs::write(
            problem.join("settings.json"),
            r#"{
                "title": "A + B",
                "time_limit_sec": 1,
                "memory_limit_mb": 64,
                "allowed_languages": ["python", "c++"],
                "submission_cooldown_sec": 30
            }"#,
        )
        .unwrap();
        std_fs::write(problem.join("index.md"), "Add two numbers.").unwrap();
        // Deliberately created out of order; the loader must sort by name
        std_fs::write(problem.join("02_big.in"), "100 200\n").unwrap();
        std_fs::write(problem.join("02_big.out"), "300\n").unwrap();
        std_fs::write(problem.join("01_small.in"), "2 3\n").unwrap();
        std_fs::write(problem.join("01_small.out"), "5\n").unwrap();
        std_fs::write(problem.join("generator.py"), "print('1 2')").unwrap();
    }

    #[tokio::test]
    async fn loads_contest_problem_and_sorted_test_cases() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let catalogue = Catalogue::new(dir.path());
        catalogue.reload().await.unwrap();

        let contest = catalogue.get_contest("Contest1").expect("contest");
        assert_eq!(contest.title, "First Contest");
        assert_eq!(contest.problems.len(), 1);

        let problem = catalogue.get_problem("Contest1", "sum").expect("problem");
        assert_eq!(problem.title, "A + B");
        assert_eq!(problem.time_limit_sec, 1);
        assert_eq!(problem.submission_cooldown_sec, Some(30));
        assert!(problem.generator_available());
        assert_eq!(problem.generator.as_ref().unwrap().language, "python");

        let names: Vec<&str> = problem
            .test_cases
            .iter()
            .map(|tc| tc.name.as_str())
            .collect();
        assert_eq!(names, vec!["01_small", "02_big"]);
        assert_eq!(problem.test_cases[0].input.as_deref(), Some("2 3\n"));
        assert_eq!(problem.test_cases[0].expected_output.as_deref(), Some("5\n"));
    }

    #[tokio::test]
    async fn reload_matches_a_cold_start_from_the_same_data() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let warm = Catalogue::new(dir.path());
        warm.reload().await.unwrap();
        warm.reload().await.unwrap();

        let cold = Catalogue::new(dir.path());
        cold.reload().await.unwrap();

        let warm_problem = warm.get_problem("Contest1", "sum").unwrap();
        let cold_problem = cold.get_problem("Contest1", "sum").unwrap();
        assert_eq!(warm_problem.title, cold_problem.title);
        assert_eq!(
            warm_problem.test_cases.len(),
            cold_problem.test_cases.len()
        );
        assert_eq!(warm.all_contests().len(), cold.all_contests().len());
    }

    #[tokio::test]
    async fn unknown_lookups_return_none() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let catalogue = Catalogue::new(dir.path());
        catalogue.reload().await.unwrap();

        assert!(catalogue.get_contest("nope").is_none());
        assert!(catalogue.get_problem("Contest1", "nope").is_none());
        assert!(catalogue.get_problem("nope", "sum").is_none());
    }

    #[tokio::test]
    async fn missing_data_directory_yields_an_empty_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = Catalogue::new(dir.path().join("absent"));
        catalogue.reload().await.unwrap();
        assert!(catalogue.all_contests().is_empty());
    }
}
