//! Audit event sink
//!
//! Services record who did what; the sink must never block a worker, so
//! the default implementation hands events to the tracing pipeline on a
//! dedicated target and returns immediately.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One structured audit event
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub event_type: String,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: None,
            user_email: None,
            event_type: event_type.into(),
            details,
        }
    }

    pub fn for_user(mut self, user_id: i64, user_email: &str) -> Self {
        self.user_id = Some(user_id);
        self.user_email = Some(user_email.to_string());
        self
    }
}

/// Best-effort structured event writer
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured tracing events on the `audit` target
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let details = event.details.to_string();
        tracing::info!(
            target: "audit",
            timestamp = %event.timestamp.to_rfc3339(),
            user_id = event.user_id,
            user_email = event.user_email.as_deref(),
            event_type = %event.event_type,
            details = %details,
        );
    }
}

/// Discards everything; for tests
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_optional_user_fields_omitted() {
        let event = AuditEvent::new("submission_request", serde_json::json!({"problem": "sum"}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("submission_request"));
        assert!(!json.contains("user_email"));

        let event = event.for_user(7, "a@b.c");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("a@b.c"));
    }
}
