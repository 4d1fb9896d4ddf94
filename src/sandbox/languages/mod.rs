//! Language registry
//!
//! Closed enumeration of the languages the judge can compile and run.
//! Command templates are fixed argv vectors referencing only the canonical
//! in-sandbox paths; untrusted data is never rendered into them.

pub mod c;
pub mod cpp;
pub mod python;

use crate::config::SandboxConfig;
use crate::constants::{languages, sandbox_paths};

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    C,
    Cpp,
}

impl Language {
    /// Resolve a user-supplied tag. `cpp` is accepted as an alias of `c++`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            languages::PYTHON => Some(Self::Python),
            languages::C => Some(Self::C),
            languages::CPP | "cpp" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Canonical tag
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Python => languages::PYTHON,
            Self::C => languages::C,
            Self::Cpp => languages::CPP,
        }
    }

    /// Build the command templates for this language
    pub fn spec(&self, config: &SandboxConfig) -> LanguageSpec {
        match self {
            Self::Python => python::spec(config),
            Self::C => c::spec(config),
            Self::Cpp => cpp::spec(config),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Absolute in-sandbox source path for a given extension
pub(super) fn source_path_for(extension: &str) -> String {
    format!(
        "{}/{}.{}",
        sandbox_paths::WORKSPACE,
        sandbox_paths::SOURCE_STEM,
        extension
    )
}

/// Source extension and command templates for one language
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    /// Source-file extension, without the dot
    pub extension: &'static str,
    /// Compile argv, if the language needs a compile phase
    pub compile: Option<Vec<String>>,
    /// Run argv
    pub run: Vec<String>,
}

impl LanguageSpec {
    /// Source filename inside the sandbox workspace
    pub fn source_file_name(&self) -> String {
        format!("{}.{}", sandbox_paths::SOURCE_STEM, self.extension)
    }

    /// Absolute in-sandbox source path
    pub fn source_path(&self) -> String {
        source_path_for(self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::constants::{
        DEFAULT_COMPILE_MEMORY_LIMIT_MB, DEFAULT_COMPILE_TIME_LIMIT_SECONDS,
        DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_TASKS_MAX, JUDGE_SLICE, WALL_CLOCK_MARGIN_SECONDS,
        tools,
    };

    fn test_config() -> SandboxConfig {
        SandboxConfig {
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
        }
    }

    #[test]
    fn tags_resolve_with_cpp_alias() {
        assert_eq!(Language::from_tag("python"), Some(Language::Python));
        assert_eq!(Language::from_tag("C"), Some(Language::C));
        assert_eq!(Language::from_tag("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_tag("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_tag("java"), None);
    }

    #[test]
    fn python_has_no_compile_phase() {
        let spec = Language::Python.spec(&test_config());
        assert!(spec.compile.is_none());
        assert_eq!(spec.source_path(), "/sandbox/source.py");
        assert_eq!(spec.run.last().unwrap(), "/sandbox/source.py");
    }

    #[test]
    fn compiled_languages_target_the_prog_path() {
        for lang in [Language::C, Language::Cpp] {
            let spec = lang.spec(&test_config());
            let compile = spec.compile.as_ref().expect("compile template");
            assert!(compile.contains(&"/sandbox/prog".to_string()));
            assert!(compile.contains(&spec.source_path()));
            assert_eq!(spec.run, vec!["/sandbox/prog".to_string()]);
        }
    }
}
