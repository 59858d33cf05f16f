//! PostgreSQL implementation of LicenseStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanlock_core::ids::{LicenseId, LicenseKey, UserId};
use scanlock_core::license::{
    DeviceAttributes, DeviceBinding, IpRecord, License, LicenseStatus, SecurityRecord,
    SuspiciousActivity, UsageCounters,
};
use scanlock_core::ports::LicenseStore;
use scanlock_core::tier::Tier;
use scanlock_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::str::FromStr;

const ALL_COLUMNS: &str = "id, user_id, license_key, tier, status, start_date, end_date, \
     features, device, ip_history, last_used, scan_count, scan_limit, last_scan_time, \
     activations, main_hash, backup_hash, verification_token, last_verified, \
     suspicious_activities, created_at, updated_at";

/// Static device-binding fields stored as one JSONB document. The mutable
/// pieces (ip_history, last_used) are dedicated columns so the usage update
/// stays a single atomic statement.
#[derive(Serialize, Deserialize)]
struct DeviceDoc {
    attributes: DeviceAttributes,
    fingerprint: String,
    fingerprint_salt: String,
}

/// PostgreSQL implementation of LicenseStore.
#[derive(Clone)]
pub struct PgLicenseStore {
    pool: PgPool,
}

impl PgLicenseStore {
    /// Create a new PgLicenseStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn status_to_str(status: &LicenseStatus) -> &'static str {
        match status {
            LicenseStatus::Active => "ACTIVE",
            LicenseStatus::Expired => "EXPIRED",
            LicenseStatus::Revoked => "REVOKED",
            LicenseStatus::Suspended => "SUSPENDED",
        }
    }

    fn str_to_status(s: &str) -> LicenseStatus {
        match s {
            "ACTIVE" => LicenseStatus::Active,
            "REVOKED" => LicenseStatus::Revoked,
            "SUSPENDED" => LicenseStatus::Suspended,
            _ => LicenseStatus::Expired,
        }
    }

    fn row_to_license(&self, r: &sqlx::postgres::PgRow) -> Result<License> {
        let device: DeviceDoc = serde_json::from_value(r.get("device"))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let ip_history: Vec<IpRecord> = serde_json::from_value(r.get("ip_history"))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let features: Vec<String> = serde_json::from_value(r.get("features"))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let suspicious: Vec<SuspiciousActivity> =
            serde_json::from_value(r.get("suspicious_activities"))
                .map_err(|e| Error::Serialization(e.to_string()))?;
        let tier_str: String = r.get("tier");
        let status_str: String = r.get("status");

        Ok(License {
            id: LicenseId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            user_id: UserId::from_uuid(r.get::<uuid::Uuid, _>("user_id")),
            key: LicenseKey::new(r.get::<String, _>("license_key")),
            tier: Tier::from_str(&tier_str)?,
            status: Self::str_to_status(&status_str),
            start_date: r.get("start_date"),
            end_date: r.get("end_date"),
            features,
            device: DeviceBinding {
                attributes: device.attributes,
                fingerprint: device.fingerprint,
                fingerprint_salt: device.fingerprint_salt,
                last_used: r.get("last_used"),
                ip_history,
            },
            usage: UsageCounters {
                scan_count: r.get::<i64, _>("scan_count") as u64,
                scan_limit: r.get::<Option<i64>, _>("scan_limit").map(|l| l as u64),
                last_scan_time: r.get("last_scan_time"),
                activations: r.get::<i32, _>("activations") as u32,
            },
            security: SecurityRecord {
                main_hash: r.get("main_hash"),
                backup_hash: r.get("backup_hash"),
                verification_token: r.get("verification_token"),
                last_verified: r.get("last_verified"),
                suspicious_activities: suspicious,
            },
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }
}

#[async_trait]
impl LicenseStore for PgLicenseStore {
    async fn insert(&self, license: &License) -> Result<()> {
        let device_json = serde_json::to_value(DeviceDoc {
            attributes: license.device.attributes.clone(),
            fingerprint: license.device.fingerprint.clone(),
            fingerprint_salt: license.device.fingerprint_salt.clone(),
        })
        .map_err(|e| Error::Serialization(e.to_string()))?;
        let ip_history_json = serde_json::to_value(&license.device.ip_history)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let features_json = serde_json::to_value(&license.features)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let suspicious_json = serde_json::to_value(&license.security.suspicious_activities)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO licenses (id, user_id, license_key, tier, status, start_date, end_date, \
             features, device, ip_history, last_used, scan_count, scan_limit, last_scan_time, \
             activations, main_hash, backup_hash, verification_token, last_verified, \
             suspicious_activities, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22)",
        )
        .bind(license.id.as_uuid())
        .bind(license.user_id.as_uuid())
        .bind(license.key.as_str())
        .bind(license.tier.as_str())
        .bind(Self::status_to_str(&license.status))
        .bind(license.start_date)
        .bind(license.end_date)
        .bind(&features_json)
        .bind(&device_json)
        .bind(&ip_history_json)
        .bind(license.device.last_used)
        .bind(license.usage.scan_count as i64)
        .bind(license.usage.scan_limit.map(|l| l as i64))
        .bind(license.usage.last_scan_time)
        .bind(license.usage.activations as i32)
        .bind(&license.security.main_hash)
        .bind(&license.security.backup_hash)
        .bind(&license.security.verification_token)
        .bind(license.security.last_verified)
        .bind(&suspicious_json)
        .bind(license.created_at)
        .bind(license.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::DuplicateKey(license.key.to_string())
            }
            _ => Error::Store(e.to_string()),
        })?;
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>> {
        let row = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM licenses WHERE license_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        match row {
            Some(r) => Ok(Some(self.row_to_license(&r)?)),
            None => Ok(None),
        }
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<License>> {
        let row = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM licenses \
             WHERE user_id = $1 AND status = 'ACTIVE' AND end_date > $2 \
             ORDER BY end_date DESC LIMIT 1"
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        match row {
            Some(r) => Ok(Some(self.row_to_license(&r)?)),
            None => Ok(None),
        }
    }

    async fn record_verification(
        &self,
        key: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<License> {
        let ip_record = serde_json::to_value(IpRecord {
            ip: client_ip.to_string(),
            timestamp: now,
        })
        .map_err(|e| Error::Serialization(e.to_string()))?;

        // Single statement keeps the increment linearizable per key.
        let row = sqlx::query(&format!(
            "UPDATE licenses SET scan_count = scan_count + 1, last_scan_time = $2, \
             last_used = $2, last_verified = $2, ip_history = ip_history || $3::jsonb, \
             updated_at = $2 WHERE license_key = $1 RETURNING {ALL_COLUMNS}"
        ))
        .bind(key)
        .bind(now)
        .bind(&ip_record)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?
        .ok_or_else(|| Error::NotFound(key.to_string()))?;

        self.row_to_license(&row)
    }

    async fn record_suspicious(&self, key: &str, activity: SuspiciousActivity) -> Result<()> {
        let activity_json =
            serde_json::to_value(&activity).map_err(|e| Error::Serialization(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE licenses SET suspicious_activities = suspicious_activities || $2::jsonb, \
             updated_at = $3 WHERE license_key = $1",
        )
        .bind(key)
        .bind(&activity_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn set_status(&self, key: &str, status: LicenseStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE licenses SET status = $2, updated_at = $3 WHERE license_key = $1",
        )
        .bind(key)
        .bind(Self::status_to_str(&status))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_str_roundtrip() {
        for status in [
            LicenseStatus::Active,
            LicenseStatus::Expired,
            LicenseStatus::Revoked,
            LicenseStatus::Suspended,
        ] {
            let s = PgLicenseStore::status_to_str(&status);
            assert_eq!(PgLicenseStore::str_to_status(s), status);
        }
    }

    #[test]
    fn test_device_doc_roundtrip() {
        let doc = DeviceDoc {
            attributes: DeviceAttributes {
                device_id: "dev-1".to_string(),
                platform: "linux".to_string(),
                model: "generic".to_string(),
                version: "1.0".to_string(),
                extra: Default::default(),
            },
            fingerprint: "fp".to_string(),
            fingerprint_salt: "salt".to_string(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        let parsed: DeviceDoc = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.attributes.device_id, "dev-1");
        assert_eq!(parsed.fingerprint_salt, "salt");
    }
}
