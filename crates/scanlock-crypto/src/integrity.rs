//! Tamper-detection hashes.
//!
//! Two independent SHA-512 hashes cover a license: the main hash over the
//! issuance identity fields, the backup hash over the device binding and
//! verification token. Both must re-derive identically for integrity to
//! hold; comparison is constant-time.
//!
//! Timestamps feeding the hashes are formatted at millisecond precision, so
//! issuance must truncate them to whole milliseconds to survive storage
//! round-trips.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use scanlock_core::license::License;
use scanlock_core::{Error, Result};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;

fn stamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Compute the `(main_hash, backup_hash)` pair for a license.
pub fn compute_hashes(license: &License) -> (String, String) {
    let main_data = format!(
        "{}{}{}{}{}",
        license.key,
        license.user_id,
        license.tier,
        stamp(license.start_date),
        stamp(license.end_date)
    );
    let backup_data = format!(
        "{}{}{}",
        license.device.fingerprint,
        license.security.verification_token,
        stamp(license.created_at)
    );
    (
        hex::encode(Sha512::digest(main_data.as_bytes())),
        hex::encode(Sha512::digest(backup_data.as_bytes())),
    )
}

/// Recompute both hashes and compare byte-for-byte in constant time.
///
/// Any mismatch means tampering or corruption and must invalidate the
/// license regardless of status or dates.
pub fn verify_integrity(license: &License) -> bool {
    let (main, backup) = compute_hashes(license);
    let main_ok: bool = main
        .as_bytes()
        .ct_eq(license.security.main_hash.as_bytes())
        .into();
    let backup_ok: bool = backup
        .as_bytes()
        .ct_eq(license.security.backup_hash.as_bytes())
        .into();
    main_ok && backup_ok
}

/// Generate the random verification token minted at issuance.
pub fn generate_verification_token() -> Result<String> {
    let mut token = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut token)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    Ok(hex::encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scanlock_core::license::*;
    use scanlock_core::tier::Tier;
    use scanlock_core::{LicenseId, LicenseKey, UserId};
    use std::collections::HashMap;

    fn sealed_license() -> License {
        let now = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let mut license = License {
            id: LicenseId::new(),
            user_id: UserId::new(),
            key: LicenseKey::new("KXT9-ABCDEF0123456789-0123456789AB"),
            tier: Tier::Basic,
            status: LicenseStatus::Active,
            start_date: now,
            end_date: now + Duration::days(180),
            features: Tier::Basic.feature_list(),
            device: DeviceBinding {
                attributes: DeviceAttributes {
                    device_id: "dev-1".to_string(),
                    platform: "linux".to_string(),
                    model: "generic".to_string(),
                    version: "1.0".to_string(),
                    extra: HashMap::new(),
                },
                fingerprint: "f".repeat(128),
                fingerprint_salt: "a".repeat(32),
                last_used: None,
                ip_history: vec![],
            },
            usage: UsageCounters {
                scan_count: 0,
                scan_limit: Some(1000),
                last_scan_time: None,
                activations: 0,
            },
            security: SecurityRecord {
                main_hash: String::new(),
                backup_hash: String::new(),
                verification_token: generate_verification_token().unwrap(),
                last_verified: None,
                suspicious_activities: vec![],
            },
            created_at: now,
            updated_at: now,
        };
        let (main, backup) = compute_hashes(&license);
        license.security.main_hash = main;
        license.security.backup_hash = backup;
        license
    }

    #[test]
    fn test_verifies_immediately_after_sealing() {
        assert!(verify_integrity(&sealed_license()));
    }

    #[test]
    fn test_mutated_hashed_field_fails() {
        let mut license = sealed_license();
        license.tier = Tier::Enterprise;
        assert!(!verify_integrity(&license));
    }

    #[test]
    fn test_mutated_end_date_fails() {
        let mut license = sealed_license();
        license.end_date = license.end_date + Duration::days(365);
        assert!(!verify_integrity(&license));
    }

    #[test]
    fn test_mutated_token_fails_backup_hash() {
        let mut license = sealed_license();
        license.security.verification_token = "0".repeat(64);
        assert!(!verify_integrity(&license));
    }

    #[test]
    fn test_unhashed_mutation_still_verifies() {
        // Usage counters are mutable state and deliberately uncovered.
        let mut license = sealed_license();
        license.usage.scan_count = 42;
        assert!(verify_integrity(&license));
    }

    #[test]
    fn test_truncated_stored_hash_fails() {
        let mut license = sealed_license();
        license.security.main_hash.truncate(64);
        assert!(!verify_integrity(&license));
    }
}
