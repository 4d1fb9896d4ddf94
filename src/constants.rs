//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// JUDGE PIPELINE DEFAULTS
// =============================================================================

/// Default bound of the in-process submission queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default time limit in seconds when a problem definition omits one
pub const DEFAULT_TIME_LIMIT_SECONDS: u64 = 2;

/// Default memory limit in megabytes when a problem definition omits one
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 64;

// =============================================================================
// SANDBOX DEFAULTS
// =============================================================================

/// Compile-phase time limit in seconds (independent of run limits)
pub const DEFAULT_COMPILE_TIME_LIMIT_SECONDS: u64 = 30;

/// Compile-phase memory limit in megabytes
pub const DEFAULT_COMPILE_MEMORY_LIMIT_MB: u64 = 512;

/// Cap on bytes a sandboxed program may write to stdout or stderr
pub const DEFAULT_OUTPUT_LIMIT_BYTES: u64 = 64 * 1024 * 1024;

/// Added to twice the CPU limit to form the wall-clock bound
pub const WALL_CLOCK_MARGIN_SECONDS: u64 = 5;

/// Maximum number of tasks (threads + processes) inside one sandbox
pub const DEFAULT_TASKS_MAX: u32 = 64;

/// Bytes of stdout kept in a wrong-answer excerpt and of stderr kept anywhere
pub const OUTPUT_EXCERPT_BYTES: usize = 4096;

/// systemd slice that collects all judge scopes
pub const JUDGE_SLICE: &str = "judge.slice";

/// Canonical paths visible inside the sandbox
pub mod sandbox_paths {
    /// Mount point of the writable workspace
    pub const WORKSPACE: &str = "/sandbox";

    /// Source file stem; the language extension is appended
    pub const SOURCE_STEM: &str = "source";

    /// Compiled artifact
    pub const PROG: &str = "/sandbox/prog";

    /// Program stdin
    pub const INPUT: &str = "/sandbox/input.txt";

    /// Validator argv: test input, user stdout, expected output
    pub const VALIDATOR_INPUT: &str = "/sandbox/input.txt";
    pub const VALIDATOR_USER_OUT: &str = "/sandbox/user.out";
    pub const VALIDATOR_EXPECTED_OUT: &str = "/sandbox/expected.out";
}

/// Host tool locations (overridable via configuration)
pub mod tools {
    pub const BWRAP: &str = "/usr/bin/bwrap";
    pub const PYTHON3: &str = "/usr/bin/python3";
    pub const GCC: &str = "/usr/bin/gcc";
    pub const GPP: &str = "/usr/bin/g++";
    pub const SYSTEMD_RUN: &str = "systemd-run";
    pub const SYSTEMCTL: &str = "systemctl";
}

// =============================================================================
// RATE LIMIT DEFAULTS
// =============================================================================

/// Default cooldown between two submissions by the same user
pub const DEFAULT_SUBMISSION_COOLDOWN_SECONDS: u64 = 10;

/// Default cooldown between two generator runs by the same user
pub const DEFAULT_GENERATOR_COOLDOWN_SECONDS: u64 = 10;

/// Default cooldown between two playground runs by the same user
pub const DEFAULT_PLAYGROUND_COOLDOWN_SECONDS: u64 = 3;

// =============================================================================
// PLAYGROUND DEFAULTS
// =============================================================================

/// Playground execution time limit in seconds
pub const DEFAULT_PLAYGROUND_TIME_LIMIT_SECONDS: u64 = 1;

/// Playground memory limit in megabytes
pub const DEFAULT_PLAYGROUND_MEMORY_LIMIT_MB: u64 = 64;

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const PYTHON: &str = "python";
    pub const C: &str = "c";
    pub const CPP: &str = "c++";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[PYTHON, C, CPP];
}

// =============================================================================
// CATALOGUE LAYOUT
// =============================================================================

/// Filenames the catalogue loader looks for inside contest/problem dirs
pub mod catalogue_files {
    pub const SETTINGS: &str = "settings.json";
    pub const DESCRIPTION: &str = "index.md";
    pub const INPUT_EXTENSION: &str = "in";
    pub const OUTPUT_EXTENSION: &str = "out";
    pub const VALIDATOR_STEM: &str = "validator";
    pub const GENERATOR_STEM: &str = "generator";
}
