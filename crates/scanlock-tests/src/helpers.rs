//! Test helper fakes: an in-memory license store with the same atomicity
//! contract as the PostgreSQL one, a fault-injecting cache wrapper, and a
//! recording audit sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanlock_cache::MemoryVerificationCache;
use scanlock_core::audit::AuditEvent;
use scanlock_core::ids::UserId;
use scanlock_core::license::{License, LicenseStatus, SuspiciousActivity};
use scanlock_core::ports::{
    AuditSink, CachedVerification, LicenseStore, UserLicenseSummary, VerificationCache,
};
use scanlock_core::{Error, Result};
use scanlock_service::{LicenseService, TracingAuditSink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// In-memory [`LicenseStore`] keyed by license key.
#[derive(Default)]
pub struct MemoryLicenseStore {
    records: RwLock<HashMap<String, License>>,
    find_by_key_calls: AtomicUsize,
    find_active_calls: AtomicUsize,
    fail_next_insert_as_duplicate: AtomicBool,
}

impl MemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_key` calls observed, for cache-hit assertions.
    pub fn find_by_key_calls(&self) -> usize {
        self.find_by_key_calls.load(Ordering::SeqCst)
    }

    pub fn find_active_calls(&self) -> usize {
        self.find_active_calls.load(Ordering::SeqCst)
    }

    /// Make the next insert fail as a key collision.
    pub fn fail_next_insert_as_duplicate(&self) {
        self.fail_next_insert_as_duplicate
            .store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutate a stored record in place, bypassing the service. Used to
    /// simulate tampering and quota exhaustion.
    pub fn tamper(&self, key: &str, f: impl FnOnce(&mut License)) {
        let mut records = self.records.write().unwrap();
        if let Some(license) = records.get_mut(key) {
            f(license);
        }
    }

    /// Insert a pre-built record directly, bypassing the service.
    pub fn seed(&self, license: License) {
        self.records
            .write()
            .unwrap()
            .insert(license.key.to_string(), license);
    }
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    async fn insert(&self, license: &License) -> Result<()> {
        if self
            .fail_next_insert_as_duplicate
            .swap(false, Ordering::SeqCst)
        {
            return Err(Error::DuplicateKey(license.key.to_string()));
        }
        let mut records = self.records.write().unwrap();
        if records.contains_key(license.key.as_str()) {
            return Err(Error::DuplicateKey(license.key.to_string()));
        }
        records.insert(license.key.to_string(), license.clone());
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>> {
        self.find_by_key_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().unwrap().get(key).cloned())
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<License>> {
        self.find_active_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .find(|l| {
                l.user_id == user_id && l.status == LicenseStatus::Active && l.end_date > now
            })
            .cloned())
    }

    async fn record_verification(
        &self,
        key: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<License> {
        let mut records = self.records.write().unwrap();
        let license = records
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        license.usage.scan_count += 1;
        license.usage.last_scan_time = Some(now);
        license.device.last_used = Some(now);
        license.security.last_verified = Some(now);
        license.device.ip_history.push(scanlock_core::license::IpRecord {
            ip: client_ip.to_string(),
            timestamp: now,
        });
        license.updated_at = now;
        Ok(license.clone())
    }

    async fn record_suspicious(&self, key: &str, activity: SuspiciousActivity) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let license = records
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        license.security.suspicious_activities.push(activity);
        Ok(())
    }

    async fn set_status(&self, key: &str, status: LicenseStatus) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let license = records
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        license.status = status;
        license.updated_at = Utc::now();
        Ok(())
    }
}

/// Cache wrapper that can be switched into a failing mode to exercise the
/// best-effort fallback contract.
pub struct FlakyCache {
    inner: MemoryVerificationCache,
    failing: AtomicBool,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryVerificationCache::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Cache("injected cache failure".to_string()));
        }
        Ok(())
    }
}

impl Default for FlakyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationCache for FlakyCache {
    async fn get_license(&self, key: &str) -> Result<Option<CachedVerification>> {
        self.check()?;
        self.inner.get_license(key).await
    }

    async fn put_license(
        &self,
        key: &str,
        entry: CachedVerification,
        ttl: Duration,
    ) -> Result<()> {
        self.check()?;
        self.inner.put_license(key, entry, ttl).await
    }

    async fn invalidate_license(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.invalidate_license(key).await
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserLicenseSummary>> {
        self.check()?;
        self.inner.get_user(user_id).await
    }

    async fn put_user(
        &self,
        user_id: UserId,
        summary: UserLicenseSummary,
        ttl: Duration,
    ) -> Result<()> {
        self.check()?;
        self.inner.put_user(user_id, summary, ttl).await
    }

    async fn invalidate_user(&self, user_id: UserId) -> Result<()> {
        self.check()?;
        self.inner.invalidate_user(user_id).await
    }
}

/// Audit sink that records every event for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().iter().map(|e| e.action.clone()).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// A fully wired service over in-memory fakes, with handles kept for
/// assertions and fault injection.
pub struct TestHarness {
    pub store: Arc<MemoryLicenseStore>,
    pub cache: Arc<FlakyCache>,
    pub audit: Arc<RecordingAuditSink>,
    pub service: LicenseService,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryLicenseStore::new());
        let cache = Arc::new(FlakyCache::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let service = LicenseService::new(store.clone(), cache.clone(), audit.clone());
        Self {
            store,
            cache,
            audit,
            service,
        }
    }

    /// A service sharing this harness's store but with a cold cache, for
    /// exercising the store-side double check.
    pub fn with_cold_cache(&self) -> LicenseService {
        LicenseService::new(
            self.store.clone(),
            Arc::new(FlakyCache::new()),
            Arc::new(TracingAuditSink),
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
