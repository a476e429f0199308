use async_trait::async_trait;
use dashmap::DashMap;
use linkrelay_core::cache::Result;
use linkrelay_core::{CacheEntry, CacheStore, CanonicalUrl, Clock, Expiry, SystemClock};
use tracing::{debug, trace};

/// In-memory implementation of [`CacheStore`] using DashMap.
///
/// DashMap uses sharded locks, so lookups and writes for different keys do
/// not block each other.
#[derive(Debug)]
pub struct InMemoryCacheStore<C = SystemClock> {
    storage: DashMap<CanonicalUrl, CacheEntry>,
    expiry: Expiry,
    clock: C,
}

impl InMemoryCacheStore<SystemClock> {
    /// Creates an empty store whose entries never expire.
    pub fn new() -> Self {
        Self::with_expiry(Expiry::never())
    }

    pub fn with_expiry(expiry: Expiry) -> Self {
        Self::with_clock(expiry, SystemClock)
    }
}

impl<C: Clock> InMemoryCacheStore<C> {
    pub fn with_clock(expiry: Expiry, clock: C) -> Self {
        Self {
            storage: DashMap::new(),
            expiry,
            clock,
        }
    }

    /// Returns the entry for `url` without counting a hit, expired or not.
    pub fn peek(&self, url: &CanonicalUrl) -> Option<CacheEntry> {
        self.storage.get(url).map(|entry| entry.clone())
    }
}

impl Default for InMemoryCacheStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Clock> CacheStore for InMemoryCacheStore<C> {
    async fn get(&self, url: &CanonicalUrl) -> Result<Option<CacheEntry>> {
        let Some(mut entry) = self.storage.get_mut(url) else {
            trace!(url = %url, "cache miss");
            return Ok(None);
        };

        if self.expiry.is_expired(&entry, self.clock.now()) {
            debug!(url = %url, "cache entry expired");
            return Ok(None);
        }

        entry.hit_count += 1;
        debug!(url = %url, hits = entry.hit_count, "cache hit");
        Ok(Some(entry.clone()))
    }

    async fn put(
        &self,
        url: &CanonicalUrl,
        short_url: &str,
        provider_id: &str,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(url.clone(), short_url, provider_id, self.clock.now());
        self.storage.insert(url.clone(), entry.clone());
        debug!(url = %url, provider = provider_id, "cached short url");
        Ok(entry)
    }

    async fn purge_expired(&self) -> Result<usize> {
        if self.expiry.ttl().is_none() {
            return Ok(0);
        }

        let now = self.clock.now();
        let before = self.storage.len();
        self.storage
            .retain(|_, entry| !self.expiry.is_expired(entry, now));
        let removed = before.saturating_sub(self.storage.len());
        debug!(removed, "purged expired cache entries");
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.storage.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::{SignedDuration, Timestamp};
    use linkrelay_core::ManualClock;
    use std::time::Duration;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    fn manual_store(ttl: Option<u64>) -> (InMemoryCacheStore<ManualClock>, ManualClock) {
        let clock = ManualClock::new(Timestamp::from_second(1_000_000).unwrap());
        let store = InMemoryCacheStore::with_clock(Expiry::from_seconds(ttl), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryCacheStore::new();
        let u = url("https://example.com/a");

        store.put(&u, "https://tinyurl.com/abc", "tinyurl").await.unwrap();

        let entry = store.get(&u).await.unwrap().unwrap();
        assert_eq!(entry.short_url, "https://tinyurl.com/abc");
        assert_eq!(entry.provider_id, "tinyurl");
        assert_eq!(entry.canonical_source_url, u);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let store = InMemoryCacheStore::new();
        assert!(store.get(&url("https://nope.test")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn every_hit_increments_hit_count() {
        let store = InMemoryCacheStore::new();
        let u = url("https://example.com/a");
        store.put(&u, "https://s.test/1", "isgd").await.unwrap();

        assert_eq!(store.get(&u).await.unwrap().unwrap().hit_count, 1);
        assert_eq!(store.get(&u).await.unwrap().unwrap().hit_count, 2);
        assert_eq!(store.peek(&u).unwrap().hit_count, 2);
    }

    #[tokio::test]
    async fn put_overwrites_and_resets_hit_count() {
        let (store, clock) = manual_store(None);
        let u = url("https://example.com/a");

        store.put(&u, "https://old.test/1", "tinyurl").await.unwrap();
        store.get(&u).await.unwrap();
        store.get(&u).await.unwrap();

        clock.advance(SignedDuration::from_secs(10));
        let replaced = store.put(&u, "https://new.test/2", "isgd").await.unwrap();

        assert_eq!(replaced.hit_count, 0);
        assert_eq!(replaced.provider_id, "isgd");
        assert_eq!(replaced.created_at, clock.now());
        assert_eq!(store.peek(&u).unwrap().short_url, "https://new.test/2");
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent_but_is_kept() {
        let (store, clock) = manual_store(Some(60));
        let u = url("https://example.com/a");
        store.put(&u, "https://s.test/1", "tinyurl").await.unwrap();

        clock.advance(SignedDuration::from_secs(59));
        assert!(store.get(&u).await.unwrap().is_some());

        clock.advance(SignedDuration::from_secs(1));
        assert!(store.get(&u).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_never_serves_entries() {
        let store = InMemoryCacheStore::with_expiry(Expiry::after(Duration::ZERO));
        let u = url("https://example.com/a");
        store.put(&u, "https://s.test/1", "tinyurl").await.unwrap();

        assert!(store.get(&u).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let (store, clock) = manual_store(Some(60));
        let old = url("https://example.com/old");
        let fresh = url("https://example.com/fresh");

        store.put(&old, "https://s.test/old", "tinyurl").await.unwrap();
        clock.advance(SignedDuration::from_secs(45));
        store.put(&fresh, "https://s.test/fresh", "tinyurl").await.unwrap();
        clock.advance(SignedDuration::from_secs(30));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.peek(&old).is_none());
        assert!(store.peek(&fresh).is_some());
    }

    #[tokio::test]
    async fn purge_is_noop_without_ttl() {
        let (store, clock) = manual_store(None);
        store
            .put(&url("https://example.com/a"), "https://s.test/1", "tinyurl")
            .await
            .unwrap();
        clock.advance(SignedDuration::from_hours(24 * 365));

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryCacheStore::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let u = url(&format!("https://example{i}.com"));
                store
                    .put(&u, &format!("https://s.test/{i}"), "tinyurl")
                    .await
                    .unwrap();
                store.get(&u).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 10);
        for i in 0..10u64 {
            let entry = store.peek(&url(&format!("https://example{i}.com"))).unwrap();
            assert_eq!(entry.short_url, format!("https://s.test/{i}"));
            assert_eq!(entry.hit_count, 1);
        }
    }
}
