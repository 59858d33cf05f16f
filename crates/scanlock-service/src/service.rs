//! The license service: creation and verification orchestration.

use chrono::{DateTime, Duration, Utc};
use scanlock_cache::{CREATE_TTL, VERIFY_TTL};
use scanlock_core::audit::AuditEvent;
use scanlock_core::ids::{LicenseId, LicenseKey, UserId};
use scanlock_core::license::{
    DeviceAttributes, DeviceBinding, IpRecord, License, LicenseStatus, SecurityRecord,
    SuspiciousActivity, SuspiciousActivityKind, UsageCounters,
};
use scanlock_core::ports::{
    AuditSink, CachedVerification, LicenseStore, UserLicenseSummary, VerificationCache,
};
use scanlock_core::tier::Tier;
use scanlock_core::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-request transport facts supplied by the upstream layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_ip: String,
    pub user_agent: Option<String>,
}

/// Creation request. The principal is authenticated upstream.
#[derive(Debug, Clone)]
pub struct CreateLicenseRequest {
    pub user_id: UserId,
    pub device: DeviceAttributes,
    pub tier: Tier,
}

/// Creation response body.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedLicense {
    pub key: LicenseKey,
    pub tier: Tier,
    pub valid_until: DateTime<Utc>,
    pub features: Vec<String>,
    pub scan_limit: Option<u64>,
}

/// Verification response body.
///
/// `remaining_scans` is only reported on the authoritative path; the
/// cache path is read-only for usage and omits it.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedLicense {
    pub tier: Tier,
    pub valid_until: DateTime<Utc>,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_scans: Option<u64>,
}

/// Orchestrates license creation, verification, and administration over the
/// injected store, cache, and audit ports.
pub struct LicenseService {
    store: Arc<dyn LicenseStore>,
    cache: Arc<dyn VerificationCache>,
    audit: Arc<dyn AuditSink>,
}

impl LicenseService {
    pub fn new(
        store: Arc<dyn LicenseStore>,
        cache: Arc<dyn VerificationCache>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            cache,
            audit,
        }
    }

    /// Issue a new license for the authenticated user.
    ///
    /// Enforces the one-active-license-per-user invariant with a
    /// cache-then-store double check, then generates the key, binds the
    /// device, seals the integrity hashes, persists, and write-throughs the
    /// cache.
    pub async fn create_license(
        &self,
        request: CreateLicenseRequest,
        ctx: &RequestContext,
    ) -> Result<CreatedLicense> {
        let now = now_millis();

        if let Err(e) = validate_device(&request.device) {
            self.emit(
                AuditEvent::new("license.create", request.user_id.to_string())
                    .details("invalid device attributes")
                    .failure(),
                ctx,
            )
            .await;
            return Err(e);
        }

        // Fast path: known existing license for this user.
        match self.cache.get_user(request.user_id).await {
            Ok(Some(_)) => {
                self.emit(
                    AuditEvent::new("license.create", request.user_id.to_string())
                        .details("user already has an active license (cache)")
                        .failure(),
                    ctx,
                )
                .await;
                return Err(Error::AlreadyLicensed);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "user cache lookup failed, falling back to store"),
        }

        // Authoritative check.
        if let Some(existing) = self
            .store
            .find_active_by_user(request.user_id, now)
            .await?
        {
            if let Err(e) = self
                .cache
                .put_user(
                    request.user_id,
                    UserLicenseSummary::from_license(&existing),
                    VERIFY_TTL,
                )
                .await
            {
                warn!(error = %e, "failed to cache existing-license summary");
            }
            self.emit(
                AuditEvent::new("license.create", request.user_id.to_string())
                    .details("user already has an active license")
                    .failure(),
                ctx,
            )
            .await;
            return Err(Error::AlreadyLicensed);
        }

        let license = match self.issue(&request, ctx, now).await {
            Ok(license) => license,
            Err(e) => {
                self.emit(
                    AuditEvent::new("license.create", request.user_id.to_string())
                        .details("issuance failed")
                        .failure(),
                    ctx,
                )
                .await;
                return Err(e);
            }
        };

        // Write-through; failures here never fail the creation.
        if let Err(e) = self
            .cache
            .put_license(
                license.key.as_str(),
                CachedVerification::positive(&license),
                CREATE_TTL,
            )
            .await
        {
            warn!(error = %e, "failed to cache new license");
        }
        if let Err(e) = self
            .cache
            .put_user(
                license.user_id,
                UserLicenseSummary::from_license(&license),
                CREATE_TTL,
            )
            .await
        {
            warn!(error = %e, "failed to cache user license summary");
        }

        info!(key = %license.key, tier = %license.tier, "license created");
        self.emit(
            AuditEvent::new("license.create", license.key.to_string())
                .details(format!("tier {}", license.tier)),
            ctx,
        )
        .await;

        Ok(CreatedLicense {
            key: license.key.clone(),
            tier: license.tier,
            valid_until: license.end_date,
            features: license.features.clone(),
            scan_limit: license.usage.scan_limit,
        })
    }

    /// Verify a license key against the presenting device.
    ///
    /// Cache hits are read-only: usage is only ever incremented on the
    /// authoritative path, so a hot key cannot double-count and the cache
    /// can never drift usage away from the store.
    pub async fn verify_license(
        &self,
        key: &str,
        device: &DeviceAttributes,
        ctx: &RequestContext,
    ) -> Result<VerifiedLicense> {
        match self.cache.get_license(key).await {
            Ok(Some(entry)) => {
                if !entry.valid {
                    debug!(key, "negative cache hit");
                    self.emit(
                        AuditEvent::new("license.verify", key)
                            .details("negative cache hit")
                            .failure(),
                        ctx,
                    )
                    .await;
                    return Err(Error::LicenseInvalid);
                }
                // Positive entries always carry the salt and fingerprint;
                // treat a malformed entry as a miss.
                if let (Some(fingerprint), Some(salt), Some(tier), Some(expiry)) = (
                    entry.fingerprint.as_deref(),
                    entry.fingerprint_salt.as_deref(),
                    entry.tier,
                    entry.expiry,
                ) {
                    let presented = scanlock_crypto::derive_fingerprint(device, salt);
                    if presented != fingerprint {
                        self.flag_device_mismatch(key, ctx).await;
                        return Err(Error::DeviceMismatch);
                    }
                    self.emit(AuditEvent::new("license.verify", key).details("cache hit"), ctx)
                        .await;
                    return Ok(VerifiedLicense {
                        tier,
                        valid_until: expiry,
                        features: tier.feature_list(),
                        remaining_scans: None,
                    });
                }
                warn!(key, "malformed positive cache entry, falling back to store");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "license cache lookup failed, falling back to store"),
        }

        self.verify_against_store(key, device, ctx).await
    }

    /// Authoritative verification path: load, validate, increment, recache.
    async fn verify_against_store(
        &self,
        key: &str,
        device: &DeviceAttributes,
        ctx: &RequestContext,
    ) -> Result<VerifiedLicense> {
        let now = now_millis();
        let license = match self.store.find_by_key(key).await? {
            Some(license) => license,
            None => {
                self.cache_negative(key).await;
                self.emit(
                    AuditEvent::new("license.verify", key)
                        .details("unknown key")
                        .failure(),
                    ctx,
                )
                .await;
                return Err(Error::LicenseInvalid);
            }
        };

        if !scanlock_crypto::verify_integrity(&license) {
            warn!(key, "license integrity check failed");
            self.flag_suspicious(
                key,
                SuspiciousActivityKind::IntegrityFailure,
                format!("integrity mismatch during verification from {}", ctx.client_ip),
            )
            .await;
            self.cache_negative(key).await;
            self.emit(
                AuditEvent::new("license.verify", key)
                    .details("integrity mismatch")
                    .failure(),
                ctx,
            )
            .await;
            return Err(Error::LicenseInvalid);
        }

        if !license.is_usable(now) {
            debug!(key, status = ?license.status, "license not usable");
            self.cache_negative(key).await;
            self.emit(
                AuditEvent::new("license.verify", key)
                    .details("invalid, expired, or over quota")
                    .failure(),
                ctx,
            )
            .await;
            return Err(Error::LicenseInvalid);
        }

        let presented =
            scanlock_crypto::derive_fingerprint(device, &license.device.fingerprint_salt);
        if presented != license.device.fingerprint {
            self.flag_device_mismatch(key, ctx).await;
            return Err(Error::DeviceMismatch);
        }

        // Atomic increment; reload via RETURNING.
        let updated = self
            .store
            .record_verification(key, &ctx.client_ip, now)
            .await?;

        if let Err(e) = self
            .cache
            .put_license(key, CachedVerification::positive(&updated), VERIFY_TTL)
            .await
        {
            warn!(error = %e, "failed to cache verification result");
        }

        self.emit(AuditEvent::new("license.verify", key).details("verified"), ctx)
            .await;

        Ok(VerifiedLicense {
            tier: updated.tier,
            valid_until: updated.end_date,
            features: updated.features.clone(),
            remaining_scans: updated.remaining_scans(),
        })
    }

    /// Generate, seal, and persist a new license. A key collision is
    /// astronomically rare; generation is retried exactly once before
    /// giving up.
    async fn issue(
        &self,
        request: &CreateLicenseRequest,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<License> {
        let key = scanlock_crypto::generate_license_key()?;
        let license = self.seal_license(request, key, ctx, now)?;
        match self.store.insert(&license).await {
            Ok(()) => Ok(license),
            Err(Error::DuplicateKey(dup)) => {
                warn!(key = %dup, "license key collision, regenerating once");
                let retry_key = scanlock_crypto::generate_license_key()?;
                let retried = self.seal_license(request, retry_key, ctx, now)?;
                match self.store.insert(&retried).await {
                    Ok(()) => Ok(retried),
                    Err(Error::DuplicateKey(dup)) => Err(Error::Internal(format!(
                        "license key collision persisted after retry: {dup}"
                    ))),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Administrative lookup of the full record. Unlike verification, this
    /// path distinguishes unknown keys with a not-found error.
    pub async fn get_license(&self, key: &str, ctx: &RequestContext) -> Result<License> {
        let Some(license) = self.store.find_by_key(key).await? else {
            self.emit(
                AuditEvent::new("license.get", key)
                    .details("unknown key")
                    .failure(),
                ctx,
            )
            .await;
            return Err(Error::NotFound(key.to_string()));
        };
        self.emit(AuditEvent::new("license.get", key), ctx).await;
        Ok(license)
    }

    /// Administrative revoke: sets REVOKED and actively invalidates both
    /// cache namespaces so the next verification is refused immediately.
    pub async fn revoke_license(&self, key: &str, ctx: &RequestContext) -> Result<()> {
        let Some(license) = self.store.find_by_key(key).await? else {
            self.emit(
                AuditEvent::new("license.revoke", key)
                    .details("unknown key")
                    .failure(),
                ctx,
            )
            .await;
            return Err(Error::NotFound(key.to_string()));
        };

        self.store.set_status(key, LicenseStatus::Revoked).await?;

        if let Err(e) = self.cache.invalidate_license(key).await {
            warn!(error = %e, "failed to invalidate license cache entry");
        }
        if let Err(e) = self.cache.invalidate_user(license.user_id).await {
            warn!(error = %e, "failed to invalidate user cache entry");
        }

        info!(key, "license revoked");
        self.emit(AuditEvent::new("license.revoke", key), ctx).await;
        Ok(())
    }

    /// Assemble and seal a new license: bind the device, mint the
    /// verification token, and compute the integrity hash pair.
    fn seal_license(
        &self,
        request: &CreateLicenseRequest,
        key: String,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<License> {
        let config = request.tier.config();
        let salt = scanlock_crypto::generate_salt()?;
        let fingerprint = scanlock_crypto::derive_fingerprint(&request.device, &salt);

        let mut license = License {
            id: LicenseId::new(),
            user_id: request.user_id,
            key: LicenseKey::new(key),
            tier: request.tier,
            status: LicenseStatus::Active,
            start_date: now,
            end_date: now + Duration::days(config.duration_days),
            features: request.tier.feature_list(),
            device: DeviceBinding {
                attributes: request.device.clone(),
                fingerprint,
                fingerprint_salt: salt,
                last_used: None,
                ip_history: vec![IpRecord {
                    ip: ctx.client_ip.clone(),
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
                verification_token: scanlock_crypto::generate_verification_token()?,
                last_verified: None,
                suspicious_activities: vec![],
            },
            created_at: now,
            updated_at: now,
        };

        let (main_hash, backup_hash) = scanlock_crypto::compute_hashes(&license);
        license.security.main_hash = main_hash;
        license.security.backup_hash = backup_hash;
        Ok(license)
    }

    async fn flag_device_mismatch(&self, key: &str, ctx: &RequestContext) {
        warn!(key, ip = %ctx.client_ip, "device fingerprint mismatch");
        self.flag_suspicious(
            key,
            SuspiciousActivityKind::DeviceMismatch,
            format!("attempt from IP: {}", ctx.client_ip),
        )
        .await;
        self.emit(
            AuditEvent::new("license.verify", key)
                .details("device fingerprint mismatch")
                .failure(),
            ctx,
        )
        .await;
    }

    /// Best-effort: a failed suspicious-activity write never blocks the
    /// primary response.
    async fn flag_suspicious(&self, key: &str, kind: SuspiciousActivityKind, details: String) {
        let activity = SuspiciousActivity {
            kind,
            timestamp: Utc::now(),
            details,
        };
        if let Err(e) = self.store.record_suspicious(key, activity).await {
            warn!(key, error = %e, "failed to record suspicious activity");
        }
    }

    async fn cache_negative(&self, key: &str) {
        if let Err(e) = self
            .cache
            .put_license(key, CachedVerification::negative(), VERIFY_TTL)
            .await
        {
            warn!(error = %e, "failed to cache negative result");
        }
    }

    async fn emit(&self, event: AuditEvent, ctx: &RequestContext) {
        let event = match &ctx.user_agent {
            Some(ua) => event.ip(ctx.client_ip.clone()).user_agent(ua.clone()),
            None => event.ip(ctx.client_ip.clone()),
        };
        if let Err(e) = self.audit.record(event).await {
            warn!(error = %e, "failed to emit audit event");
        }
    }
}

/// All four named device attributes feed the fingerprint; a blank one
/// would weaken the binding, so creation refuses it outright.
fn validate_device(device: &DeviceAttributes) -> Result<()> {
    let required = [
        ("device_id", &device.device_id),
        ("platform", &device.platform),
        ("model", &device.model),
        ("version", &device.version),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::Validation(format!(
                "device {field} must not be empty"
            )));
        }
    }
    Ok(())
}

/// Timestamps feeding the integrity hashes carry millisecond precision, so
/// issuance truncates to whole milliseconds to survive storage round-trips.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
