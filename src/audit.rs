//! Audit event seam
//!
//! Every create/update/delete/status-transition emits an [`AuditEvent`] for
//! the external audit-log collaborator. A failing sink must never fail or roll
//! back the business operation, so emission swallows errors and reports them
//! through the `log` facade instead.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::types::Actor;

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    Posted,
}

/// One audit record handed to the external sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Actor,
    pub action: AuditAction,
    pub entity_kind: &'static str,
    pub entity_id: String,
    /// Rendered before-state, when the action replaced something
    pub before: Option<String>,
    /// Rendered after-state
    pub after: Option<String>,
    pub at: NaiveDateTime,
}

impl AuditEvent {
    pub fn new(
        actor: &Actor,
        action: AuditAction,
        entity_kind: &'static str,
        entity_id: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Self {
        Self {
            actor: actor.clone(),
            action,
            entity_kind,
            entity_id: entity_id.into(),
            before,
            after,
            at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Destination for audit events. Implementations live outside the core.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), String>;
}

/// Emit an event, swallowing sink failures.
pub(crate) fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(err) = sink.record(event) {
        log::warn!("audit sink failed, event dropped: {err}");
    }
}

/// Sink that discards everything; the default wiring.
#[derive(Debug, Default, Clone)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Sink that keeps events in memory, for assertions in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), String> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: AuditEvent) -> Result<(), String> {
            Err("sink unavailable".to_string())
        }
    }

    #[test]
    fn failing_sink_does_not_panic() {
        let actor = Actor::new("u1", Role::Admin);
        let event = AuditEvent::new(&actor, AuditAction::Created, "invoice", "i1", None, None);
        emit(&FailingSink, event);
    }

    #[test]
    fn memory_sink_collects_events() {
        let sink = MemoryAuditSink::new();
        let actor = Actor::new("u1", Role::Manager);
        emit(
            &sink,
            AuditEvent::new(&actor, AuditAction::StatusChanged, "invoice", "i1", None, None),
        );
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].entity_kind, "invoice");
    }
}
