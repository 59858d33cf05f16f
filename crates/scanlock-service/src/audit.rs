//! Audit sink backed by structured logging.
//!
//! Durable audit-log persistence belongs to an external collaborator; this
//! sink emits the structured event stream it consumes.

use async_trait::async_trait;
use scanlock_core::audit::AuditEvent;
use scanlock_core::ports::AuditSink;
use scanlock_core::Result;
use tracing::info;

/// [`AuditSink`] that logs every event through `tracing`.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        info!(
            target: "scanlock::audit",
            action = %event.action,
            resource_type = %event.resource_type,
            resource_id = %event.resource_id,
            details = %event.details,
            ip_address = event.ip_address.as_deref().unwrap_or("-"),
            user_agent = event.user_agent.as_deref().unwrap_or("-"),
            outcome = ?event.status,
            "audit event"
        );
        Ok(())
    }
}
