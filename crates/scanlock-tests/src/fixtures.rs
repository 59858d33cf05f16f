//! Test fixtures for creating sample data.

use chrono::{DateTime, Duration, Utc};
use scanlock_core::ids::{LicenseId, LicenseKey, UserId};
use scanlock_core::license::{
    DeviceAttributes, DeviceBinding, IpRecord, License, LicenseStatus, SecurityRecord,
    UsageCounters,
};
use scanlock_core::tier::Tier;
use scanlock_service::RequestContext;
use std::collections::HashMap;

pub fn device() -> DeviceAttributes {
    DeviceAttributes {
        device_id: "device-alpha".to_string(),
        platform: "linux".to_string(),
        model: "workstation".to_string(),
        version: "22.04".to_string(),
        extra: HashMap::new(),
    }
}

pub fn other_device() -> DeviceAttributes {
    DeviceAttributes {
        device_id: "device-beta".to_string(),
        platform: "windows".to_string(),
        model: "laptop".to_string(),
        version: "11".to_string(),
        extra: HashMap::new(),
    }
}

pub fn ctx() -> RequestContext {
    RequestContext {
        client_ip: "203.0.113.7".to_string(),
        user_agent: Some("scanlock-tests/1.0".to_string()),
    }
}

fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap()
}

/// Build a properly sealed license with arbitrary validity dates, the way
/// issuance would have, so integrity holds while dates can be in the past.
pub fn sealed_license(
    user_id: UserId,
    tier: Tier,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> License {
    let now = truncate_millis(start);
    let salt = scanlock_crypto::generate_salt().unwrap();
    let attributes = device();
    let fingerprint = scanlock_crypto::derive_fingerprint(&attributes, &salt);
    let config = tier.config();

    let mut license = License {
        id: LicenseId::new(),
        user_id,
        key: LicenseKey::new(scanlock_crypto::generate_license_key().unwrap()),
        tier,
        status: LicenseStatus::Active,
        start_date: now,
        end_date: truncate_millis(end),
        features: tier.feature_list(),
        device: DeviceBinding {
            attributes,
            fingerprint,
            fingerprint_salt: salt,
            last_used: None,
            ip_history: vec![IpRecord {
                ip: "203.0.113.7".to_string(),
                timestamp: now,
            }],
        },
        usage: UsageCounters {
            scan_count: 0,
            scan_limit: config.scan_limit,
            last_scan_time: None,
            activations: 1,
        },
        security: SecurityRecord {
            main_hash: String::new(),
            backup_hash: String::new(),
            verification_token: scanlock_crypto::generate_verification_token().unwrap(),
            last_verified: None,
            suspicious_activities: vec![],
        },
        created_at: now,
        updated_at: now,
    };
    let (main, backup) = scanlock_crypto::compute_hashes(&license);
    license.security.main_hash = main;
    license.security.backup_hash = backup;
    license
}

/// A sealed license that expired yesterday.
pub fn expired_license(user_id: UserId, tier: Tier) -> License {
    let end = Utc::now() - Duration::days(1);
    let start = end - Duration::days(tier.config().duration_days);
    sealed_license(user_id, tier, start, end)
}
