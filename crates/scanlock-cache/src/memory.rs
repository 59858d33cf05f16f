//! In-process cache with per-entry TTLs.

use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;
use scanlock_core::ids::UserId;
use scanlock_core::ports::{CachedVerification, UserLicenseSummary, VerificationCache};
use scanlock_core::Result;
use std::time::{Duration, Instant};
use tracing::trace;

const MAX_ENTRIES: u64 = 100_000;

/// Expires each entry after the TTL stored alongside the value.
struct PerEntryTtl;

impl<K, V> Expiry<K, (V, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &K,
        value: &(V, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    // Overwrites carry their own TTL; the default would keep the old one.
    fn expire_after_update(
        &self,
        _key: &K,
        value: &(V, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-memory [`VerificationCache`] with two namespaces, one keyed by
/// license key and one by user id.
pub struct MemoryVerificationCache {
    licenses: Cache<String, (CachedVerification, Duration)>,
    users: Cache<UserId, (UserLicenseSummary, Duration)>,
}

impl MemoryVerificationCache {
    pub fn new() -> Self {
        Self {
            licenses: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(PerEntryTtl)
                .build(),
            users: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryVerificationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationCache for MemoryVerificationCache {
    async fn get_license(&self, key: &str) -> Result<Option<CachedVerification>> {
        let hit = self.licenses.get(key).map(|(entry, _)| entry);
        trace!(key, hit = hit.is_some(), "license cache lookup");
        Ok(hit)
    }

    async fn put_license(
        &self,
        key: &str,
        entry: CachedVerification,
        ttl: Duration,
    ) -> Result<()> {
        self.licenses.insert(key.to_string(), (entry, ttl));
        Ok(())
    }

    async fn invalidate_license(&self, key: &str) -> Result<()> {
        self.licenses.invalidate(key);
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserLicenseSummary>> {
        Ok(self.users.get(&user_id).map(|(summary, _)| summary))
    }

    async fn put_user(
        &self,
        user_id: UserId,
        summary: UserLicenseSummary,
        ttl: Duration,
    ) -> Result<()> {
        self.users.insert(user_id, (summary, ttl));
        Ok(())
    }

    async fn invalidate_user(&self, user_id: UserId) -> Result<()> {
        self.users.invalidate(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanlock_core::ids::LicenseKey;
    use scanlock_core::tier::Tier;

    #[tokio::test]
    async fn test_positive_and_negative_entries() {
        let cache = MemoryVerificationCache::new();
        cache
            .put_license("GOOD", CachedVerification::negative(), Duration::from_secs(60))
            .await
            .unwrap();
        let entry = cache.get_license("GOOD").await.unwrap().unwrap();
        assert!(!entry.valid);
        assert!(cache.get_license("MISSING").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryVerificationCache::new();
        cache
            .put_license("SHORT", CachedVerification::negative(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(cache.get_license("SHORT").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_license("SHORT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidation_removes_entry() {
        let cache = MemoryVerificationCache::new();
        let user = UserId::new();
        let summary = UserLicenseSummary {
            key: LicenseKey::new("K"),
            tier: Tier::Trial,
            end_date: Utc::now(),
        };
        cache
            .put_user(user, summary, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_user(user).await.unwrap().is_some());
        cache.invalidate_user(user).await.unwrap();
        assert!(cache.get_user(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let cache = MemoryVerificationCache::new();
        let user = UserId::new();
        cache
            .put_license("K1", CachedVerification::negative(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_user(user).await.unwrap().is_none());
    }
}
