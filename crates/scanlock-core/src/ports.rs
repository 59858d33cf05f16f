//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external
//! adapters. The license store is the single source of truth; the
//! verification cache is never authoritative and every cache failure must
//! be survivable by falling back to the store.

use crate::audit::AuditEvent;
use crate::ids::{LicenseKey, UserId};
use crate::license::{License, LicenseStatus, SuspiciousActivity};
use crate::tier::Tier;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cached outcome of a license verification, positive or negative.
///
/// Negative entries carry no license data; positive entries carry enough to
/// answer the read-only cache path (fingerprint comparison included) without
/// touching the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerification {
    pub valid: bool,
    pub fingerprint: Option<String>,
    /// Salt persisted at issuance; required to recompute the fingerprint
    /// from client-supplied attributes on a cache hit.
    pub fingerprint_salt: Option<String>,
    pub tier: Option<Tier>,
    pub expiry: Option<DateTime<Utc>>,
}

impl CachedVerification {
    pub fn positive(license: &License) -> Self {
        Self {
            valid: true,
            fingerprint: Some(license.device.fingerprint.clone()),
            fingerprint_salt: Some(license.device.fingerprint_salt.clone()),
            tier: Some(license.tier),
            expiry: Some(license.end_date),
        }
    }

    pub fn negative() -> Self {
        Self {
            valid: false,
            fingerprint: None,
            fingerprint_salt: None,
            tier: None,
            expiry: None,
        }
    }
}

/// Cached summary of a user's existing license, used to short-circuit
/// duplicate creation attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLicenseSummary {
    pub key: LicenseKey,
    pub tier: Tier,
    pub end_date: DateTime<Utc>,
}

impl UserLicenseSummary {
    pub fn from_license(license: &License) -> Self {
        Self {
            key: license.key.clone(),
            tier: license.tier,
            end_date: license.end_date,
        }
    }
}

/// Authoritative persisted store of all licenses.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Insert a new license. Fails with [`crate::Error::DuplicateKey`] on a
    /// license-key collision.
    async fn insert(&self, license: &License) -> Result<()>;

    /// Find a license by key.
    async fn find_by_key(&self, key: &str) -> Result<Option<License>>;

    /// Find an ACTIVE license for the user whose end date is after `now`.
    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<License>>;

    /// Atomically increment the scan counter, stamp last-scan/last-used,
    /// and append to the IP history. Returns the updated record.
    ///
    /// Concurrent calls for the same key must not lose increments.
    async fn record_verification(
        &self,
        key: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<License>;

    /// Append a suspicious-activity record.
    async fn record_suspicious(&self, key: &str, activity: SuspiciousActivity) -> Result<()>;

    /// Set the license status (administrative revoke/suspend).
    async fn set_status(&self, key: &str, status: LicenseStatus) -> Result<()>;
}

/// Fast-path key-value cache of recent verification outcomes.
///
/// Best-effort: implementations may fail, and callers must treat any error
/// as a miss.
#[async_trait]
pub trait VerificationCache: Send + Sync {
    async fn get_license(&self, key: &str) -> Result<Option<CachedVerification>>;

    async fn put_license(&self, key: &str, entry: CachedVerification, ttl: Duration)
        -> Result<()>;

    async fn invalidate_license(&self, key: &str) -> Result<()>;

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserLicenseSummary>>;

    async fn put_user(
        &self,
        user_id: UserId,
        summary: UserLicenseSummary,
        ttl: Duration,
    ) -> Result<()>;

    async fn invalidate_user(&self, user_id: UserId) -> Result<()>;
}

/// Write-only sink for structured audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}
