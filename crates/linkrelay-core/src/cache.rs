use crate::canonical::CanonicalUrl;
use crate::error::CacheError;
use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// A previously obtained short URL for one canonical source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key.
    pub canonical_source_url: CanonicalUrl,
    /// The short URL returned by the provider.
    pub short_url: String,
    /// Id of the provider that produced `short_url`.
    pub provider_id: String,
    /// When the entry was created or last overwritten.
    pub created_at: Timestamp,
    /// Number of cache hits served since `created_at`.
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(
        canonical_source_url: CanonicalUrl,
        short_url: impl Into<String>,
        provider_id: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            canonical_source_url,
            short_url: short_url.into(),
            provider_id: provider_id.into(),
            created_at,
            hit_count: 0,
        }
    }
}

/// Optional time-to-live applied to cache entries.
///
/// An entry is expired once its age reaches the TTL, so a TTL of zero makes
/// every entry expired as soon as it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiry {
    ttl: Option<Duration>,
}

impl Expiry {
    /// Entries never expire.
    pub const fn never() -> Self {
        Self { ttl: None }
    }

    pub const fn after(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    pub fn from_seconds(ttl_seconds: Option<u64>) -> Self {
        Self {
            ttl: ttl_seconds.map(Duration::from_secs),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_expired(&self, entry: &CacheEntry, now: Timestamp) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let ttl = SignedDuration::try_from(ttl).unwrap_or(SignedDuration::MAX);
        now.duration_since(entry.created_at) >= ttl
    }
}

/// Durable mapping from canonical source URL to short URL.
///
/// The store exclusively owns its [`CacheEntry`]s: callers only observe
/// clones. Expired entries are reported as absent by [`get`](CacheStore::get)
/// but stay in the store until [`purge_expired`](CacheStore::purge_expired)
/// is called explicitly.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Looks up a non-expired entry and counts the lookup as a hit.
    ///
    /// Returns `Ok(None)` if the key is absent or expired.
    async fn get(&self, url: &CanonicalUrl) -> Result<Option<CacheEntry>>;

    /// Inserts or overwrites the entry for `url`.
    ///
    /// Overwriting replaces `short_url`, `provider_id` and `created_at` and
    /// resets `hit_count` to zero.
    async fn put(
        &self,
        url: &CanonicalUrl,
        short_url: &str,
        provider_id: &str,
    ) -> Result<CacheEntry>;

    /// Removes every expired entry and returns how many were removed.
    ///
    /// A no-op when no TTL is configured.
    async fn purge_expired(&self) -> Result<usize>;

    /// Number of entries held, expired ones included.
    async fn len(&self) -> Result<usize>;

    /// Persists state that is only held in memory, such as hit counts.
    ///
    /// Stores without durable state have nothing to do.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<C: CacheStore + ?Sized> CacheStore for Arc<C> {
    async fn get(&self, url: &CanonicalUrl) -> Result<Option<CacheEntry>> {
        (**self).get(url).await
    }

    async fn put(
        &self,
        url: &CanonicalUrl,
        short_url: &str,
        provider_id: &str,
    ) -> Result<CacheEntry> {
        (**self).put(url, short_url, provider_id).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        (**self).purge_expired().await
    }

    async fn len(&self) -> Result<usize> {
        (**self).len().await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }
}
