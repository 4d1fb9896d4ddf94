//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_submission_at: Option<DateTime<Utc>>,
    pub last_generation_at: Option<DateTime<Utc>>,
    pub last_playground_at: Option<DateTime<Utc>>,
}

impl User {
    /// Last time the user performed the given action, if ever
    pub fn last_action_at(&self, action: UserAction) -> Option<DateTime<Utc>> {
        match action {
            UserAction::Submission => self.last_submission_at,
            UserAction::Generation => self.last_generation_at,
            UserAction::Playground => self.last_playground_at,
        }
    }
}

/// Rate-limited user actions; each maps to one timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Submission,
    Generation,
    Playground,
}

impl UserAction {
    /// Identifier used in audit events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Generation => "generation",
            Self::Playground => "playground",
        }
    }
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
