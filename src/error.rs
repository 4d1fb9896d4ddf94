//! Custom error types and handling
//!
//! This module defines the application's error types. The web layer that
//! embeds this crate maps error codes to transport-level responses; user
//! verdicts are values, not errors, and never appear here.

use serde::Serialize;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Not found: {0}")]
    NotFound(String),

    // Rate limiting
    #[error("Please wait {wait_seconds} seconds before trying again")]
    RateLimited {
        /// Whole seconds left until the cooldown expires
        wait_seconds: u64,
    },

    // Queue errors
    #[error("Judging queue is full")]
    QueueFull,

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Sandbox errors that escape the engine's own outcome reporting
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Error details suitable for serialization at the boundary
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RateLimited { .. } => "TOO_MANY_REQUESTS",
            Self::QueueFull => "QUEUE_FULL",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Sandbox(_) => "SANDBOX_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Serializable details; internal errors are logged and not exposed
    pub fn details(&self) -> ErrorDetails {
        let message = match self {
            Self::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "An internal error occurred".to_string()
            }
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                "A database error occurred".to_string()
            }
            _ => self.to_string(),
        };

        ErrorDetails {
            code: self.error_code().to_string(),
            message,
            wait_seconds: match self {
                Self::RateLimited { wait_seconds } => Some(*wait_seconds),
                _ => None,
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Database(format!("Result serialization failed: {}", err))
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_details_carry_wait_seconds() {
        let details = AppError::RateLimited { wait_seconds: 7 }.details();
        assert_eq!(details.code, "TOO_MANY_REQUESTS");
        assert_eq!(details.wait_seconds, Some(7));
    }

    #[test]
    fn internal_errors_are_not_exposed() {
        let details = AppError::Internal(anyhow::anyhow!("secret pool state")).details();
        assert_eq!(details.message, "An internal error occurred");
        assert!(!details.message.contains("secret"));
    }
}
