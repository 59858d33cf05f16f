//! The `License` aggregate and its sub-records.

use crate::ids::{LicenseId, LicenseKey, UserId};
use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum permitted device re-bindings per license.
pub const MAX_ACTIVATIONS: u32 = 3;

/// License status.
///
/// `Active → Expired` is detected lazily at verification time by date
/// comparison; `Revoked` and `Suspended` are administrative transitions.
/// All non-`Active` states are terminal for verification purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
    Suspended,
}

/// Device attributes supplied by the client at creation and verification.
///
/// The named fields are required; `extra` is an open extension map for
/// forward-compatible optional attributes. Only the named fields feed the
/// fingerprint derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub device_id: String,
    pub platform: String,
    pub model: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// A single IP observation, appended on every authoritative verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRecord {
    pub ip: String,
    pub timestamp: DateTime<Utc>,
}

/// Device binding state for a license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub attributes: DeviceAttributes,
    /// PBKDF2-derived fingerprint over the device attributes.
    pub fingerprint: String,
    /// Hex-encoded salt generated once at issuance and reused for every
    /// fingerprint recomputation.
    pub fingerprint_salt: String,
    pub last_used: Option<DateTime<Utc>>,
    /// Append-only.
    pub ip_history: Vec<IpRecord>,
}

/// Usage counters for quota enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Monotonically non-decreasing while the license is active.
    pub scan_count: u64,
    /// Copied from the tier at issuance; `None` means unbounded.
    pub scan_limit: Option<u64>,
    pub last_scan_time: Option<DateTime<Utc>>,
    /// Device re-bindings consumed, capped at [`MAX_ACTIVATIONS`].
    pub activations: u32,
}

/// Kind of suspicious activity recorded against a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspiciousActivityKind {
    DeviceMismatch,
    IntegrityFailure,
}

/// Append-only suspicious-activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousActivity {
    pub kind: SuspiciousActivityKind,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Tamper-detection state for a license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRecord {
    /// SHA-512 over key, user, tier, and validity dates.
    pub main_hash: String,
    /// SHA-512 over fingerprint, verification token, and creation time.
    pub backup_hash: String,
    /// Random token generated at issuance; participates in the backup hash
    /// and is never exposed.
    pub verification_token: String,
    pub last_verified: Option<DateTime<Utc>>,
    pub suspicious_activities: Vec<SuspiciousActivity>,
}

/// The central licensing entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub user_id: UserId,
    pub key: LicenseKey,
    pub tier: Tier,
    pub status: LicenseStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Copied from the tier at issuance.
    pub features: Vec<String>,
    pub device: DeviceBinding,
    pub usage: UsageCounters,
    pub security: SecurityRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }

    /// Whether the scan quota still has headroom.
    pub fn within_quota(&self) -> bool {
        match self.usage.scan_limit {
            Some(limit) => self.usage.scan_count < limit,
            None => true,
        }
    }

    /// Remaining scans, clamped to zero. `None` means unbounded.
    pub fn remaining_scans(&self) -> Option<u64> {
        self.usage
            .scan_limit
            .map(|limit| limit.saturating_sub(self.usage.scan_count))
    }

    /// Status, date, quota, and activation-cap portion of the validity
    /// check.
    ///
    /// Integrity verification lives in `scanlock-crypto`; the service
    /// combines both before treating a license as valid.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == LicenseStatus::Active
            && !self.is_expired(now)
            && self.within_quota()
            && self.usage.activations <= MAX_ACTIVATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn license(scan_count: u64, scan_limit: Option<u64>) -> License {
        let now = Utc::now();
        License {
            id: LicenseId::new(),
            user_id: UserId::new(),
            key: LicenseKey::new("TEST-KEY"),
            tier: Tier::Trial,
            status: LicenseStatus::Active,
            start_date: now,
            end_date: now + Duration::days(30),
            features: Tier::Trial.feature_list(),
            device: DeviceBinding {
                attributes: DeviceAttributes {
                    device_id: "dev-1".to_string(),
                    platform: "linux".to_string(),
                    model: "generic".to_string(),
                    version: "1.0".to_string(),
                    extra: HashMap::new(),
                },
                fingerprint: String::new(),
                fingerprint_salt: String::new(),
                last_used: None,
                ip_history: vec![],
            },
            usage: UsageCounters {
                scan_count,
                scan_limit,
                last_scan_time: None,
                activations: 0,
            },
            security: SecurityRecord {
                main_hash: String::new(),
                backup_hash: String::new(),
                verification_token: String::new(),
                last_verified: None,
                suspicious_activities: vec![],
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quota_headroom() {
        assert!(license(99, Some(100)).within_quota());
        assert!(!license(100, Some(100)).within_quota());
        assert!(license(1_000_000, None).within_quota());
    }

    #[test]
    fn test_remaining_scans_clamped() {
        // Overshoot from a race must not underflow.
        assert_eq!(license(150, Some(100)).remaining_scans(), Some(0));
        assert_eq!(license(1, Some(100)).remaining_scans(), Some(99));
        assert_eq!(license(5, None).remaining_scans(), None);
    }

    #[test]
    fn test_expiry_is_lazy_date_comparison() {
        let mut l = license(0, Some(100));
        let now = Utc::now();
        assert!(l.is_usable(now));
        l.end_date = now - Duration::days(1);
        assert!(l.is_expired(now));
        assert!(!l.is_usable(now));
    }

    #[test]
    fn test_activation_cap_enforced() {
        let mut l = license(0, Some(100));
        l.usage.activations = MAX_ACTIVATIONS;
        assert!(l.is_usable(Utc::now()));
        l.usage.activations = MAX_ACTIVATIONS + 1;
        assert!(!l.is_usable(Utc::now()));
    }

    #[test]
    fn test_non_active_status_rejected() {
        let mut l = license(0, Some(100));
        l.status = LicenseStatus::Revoked;
        assert!(!l.is_usable(Utc::now()));
    }
}
