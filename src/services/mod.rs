//! Business logic services
//!
//! Intake functions called by the web layer. Each service validates,
//! applies the per-user rate limit, records audit events and delegates
//! to the sandbox engine, the judging queue or the repository.

pub mod generator_service;
pub mod playground_service;
pub mod rate_limit;
pub mod submission_service;

use crate::audit::AuditEvent;
use crate::error::AppResult;
use crate::state::AppState;

/// Rebuild the problem catalogue from disk and swap it in atomically.
/// Admin action; concurrent readers see the old or the new view.
pub async fn reload_catalogue(state: &AppState) -> AppResult<()> {
    state.catalogue().reload().await?;
    state.audit().record(AuditEvent::new(
        "catalogue_reloaded",
        serde_json::json!({"contests": state.catalogue().all_contests().len()}),
    ));
    Ok(())
}
