//! Structured audit events emitted to the audit-log collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// A structured audit event.
///
/// Emitted on every creation/verification/revocation outcome, success or
/// failure. Persistence is the sink's responsibility; the core only
/// produces events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditOutcome,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_type: "license".to_string(),
            resource_id: resource_id.into(),
            details: String::new(),
            ip_address: None,
            user_agent: None,
            status: AuditOutcome::Success,
            timestamp: Utc::now(),
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn failure(mut self) -> Self {
        self.status = AuditOutcome::Failure;
        self
    }
}
