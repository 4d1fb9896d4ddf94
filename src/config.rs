//! Application configuration management
//!
//! This module handles loading and validating configuration from environment
//! variables. All configuration is loaded at startup and validated before the
//! application runs.

use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::constants::{
    DEFAULT_COMPILE_MEMORY_LIMIT_MB, DEFAULT_COMPILE_TIME_LIMIT_SECONDS,
    DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_GENERATOR_COOLDOWN_SECONDS,
    DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_PLAYGROUND_COOLDOWN_SECONDS,
    DEFAULT_PLAYGROUND_MEMORY_LIMIT_MB, DEFAULT_PLAYGROUND_TIME_LIMIT_SECONDS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SUBMISSION_COOLDOWN_SECONDS, DEFAULT_TASKS_MAX, JUDGE_SLICE,
    WALL_CLOCK_MARGIN_SECONDS, tools,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub catalogue: CatalogueConfig,
    pub judge: JudgeConfig,
    pub sandbox: SandboxConfig,
    pub playground: PlaygroundConfig,
    pub rate_limit: RateLimitConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Problem catalogue configuration
#[derive(Debug, Clone)]
pub struct CatalogueConfig {
    /// Directory holding `contests/<id>/...` definitions
    pub data_dir: PathBuf,
}

/// Judging pipeline configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Number of pool workers (defaults to host CPU count)
    pub worker_count: usize,
    /// Bound of the in-process submission queue
    pub queue_capacity: usize,
}

/// Sandbox engine configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub bwrap_path: String,
    pub python_path: String,
    pub gcc_path: String,
    pub gpp_path: String,
    /// systemd slice collecting all judge scopes
    pub slice: String,
    /// Task (process/thread) cap inside one sandbox
    pub tasks_max: u32,
    /// Compile-phase limits, independent of run limits
    pub compile_time_limit_sec: u64,
    pub compile_memory_limit_mb: u64,
    /// Cap on bytes written to any one output file
    pub output_limit_bytes: u64,
    /// Wall bound = 2 * cpu limit + this margin
    pub wall_clock_margin_sec: u64,
}

impl SandboxConfig {
    /// Wall-clock bound for a given CPU limit; strictly greater than the
    /// CPU bound so "ran too long" and "blocked" stay distinguishable.
    pub fn wall_limit_sec(&self, cpu_limit_sec: u64) -> u64 {
        cpu_limit_sec * 2 + self.wall_clock_margin_sec
    }
}

/// Playground (interactive runner) configuration
#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
}

/// Global cooldown defaults; problems may override submission/generator
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub submission_cooldown_sec: u64,
    pub generator_cooldown_sec: u64,
    pub playground_cooldown_sec: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            catalogue: CatalogueConfig::from_env()?,
            judge: JudgeConfig::from_env()?,
            sandbox: SandboxConfig::from_env()?,
            playground: PlaygroundConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
        })
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?,
            max_connections: env_parsed(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
        })
    }
}

impl CatalogueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: PathBuf::from(
                env::var("SERVER_DATA_DIR").unwrap_or_else(|_| "server_data".to_string()),
            ),
        })
    }
}

impl JudgeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Ok(Self {
            worker_count: env_parsed("JUDGE_WORKER_COUNT", cpus)?,
            queue_capacity: env_parsed("JUDGE_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
        })
    }
}

impl SandboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bwrap_path: env::var("BWRAP_PATH").unwrap_or_else(|_| tools::BWRAP.to_string()),
            python_path: env::var("PYTHON3_PATH").unwrap_or_else(|_| tools::PYTHON3.to_string()),
            gcc_path: env::var("GCC_PATH").unwrap_or_else(|_| tools::GCC.to_string()),
            gpp_path: env::var("GPP_PATH").unwrap_or_else(|_| tools::GPP.to_string()),
            slice: env::var("JUDGE_SLICE").unwrap_or_else(|_| JUDGE_SLICE.to_string()),
            tasks_max: env_parsed("SANDBOX_TASKS_MAX", DEFAULT_TASKS_MAX)?,
            compile_time_limit_sec: env_parsed(
                "COMPILE_TIME_LIMIT_SECONDS",
                DEFAULT_COMPILE_TIME_LIMIT_SECONDS,
            )?,
            compile_memory_limit_mb: env_parsed(
                "COMPILE_MEMORY_LIMIT_MB",
                DEFAULT_COMPILE_MEMORY_LIMIT_MB,
            )?,
            output_limit_bytes: env_parsed("SANDBOX_OUTPUT_LIMIT_BYTES", DEFAULT_OUTPUT_LIMIT_BYTES)?,
            wall_clock_margin_sec: env_parsed(
                "SANDBOX_WALL_MARGIN_SECONDS",
                WALL_CLOCK_MARGIN_SECONDS,
            )?,
        })
    }
}

impl PlaygroundConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            time_limit_sec: env_parsed(
                "PLAYGROUND_TIME_LIMIT_SECONDS",
                DEFAULT_PLAYGROUND_TIME_LIMIT_SECONDS,
            )?,
            memory_limit_mb: env_parsed(
                "PLAYGROUND_MEMORY_LIMIT_MB",
                DEFAULT_PLAYGROUND_MEMORY_LIMIT_MB,
            )?,
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            submission_cooldown_sec: env_parsed(
                "SUBMISSION_COOLDOWN_SECONDS",
                DEFAULT_SUBMISSION_COOLDOWN_SECONDS,
            )?,
            generator_cooldown_sec: env_parsed(
                "GENERATOR_COOLDOWN_SECONDS",
                DEFAULT_GENERATOR_COOLDOWN_SECONDS,
            )?,
            playground_cooldown_sec: env_parsed(
                "PLAYGROUND_COOLDOWN_SECONDS",
                DEFAULT_PLAYGROUND_COOLDOWN_SECONDS,
            )?,
        })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_limit_is_strictly_greater_than_cpu_limit() {
        let sandbox = SandboxConfig {
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
        };
        for cpu in [0, 1, 2, 30] {
            assert!(sandbox.wall_limit_sec(cpu) > cpu);
        }
    }
}
