use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;
use linkrelay_core::cache::Result;
use linkrelay_core::{CacheEntry, CacheError, CacheStore, CanonicalUrl, Clock, Expiry, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<CanonicalUrl, StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    short_url: String,
    provider_id: String,
    created_at: Timestamp,
    #[serde(default)]
    hit_count: u64,
}

impl StoredEntry {
    fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            short_url: entry.short_url.clone(),
            provider_id: entry.provider_id.clone(),
            created_at: entry.created_at,
            hit_count: entry.hit_count,
        }
    }

    fn into_entry(self, url: CanonicalUrl) -> CacheEntry {
        CacheEntry {
            canonical_source_url: url,
            short_url: self.short_url,
            provider_id: self.provider_id,
            created_at: self.created_at,
            hit_count: self.hit_count,
        }
    }
}

/// A [`CacheStore`] persisted as a JSON mapping file keyed by canonical URL.
///
/// Entries live in a DashMap so reads never wait on disk. Every `put`
/// rewrites the whole file through a temporary sibling that is renamed over
/// the target, serialized by a writer lock. Hit counts are kept in memory and
/// reach the disk with the next write or [`CacheStore::flush`].
#[derive(Debug)]
pub struct JsonFileCacheStore<C = SystemClock> {
    path: PathBuf,
    entries: DashMap<CanonicalUrl, CacheEntry>,
    expiry: Expiry,
    clock: C,
    writer: Mutex<()>,
}

impl JsonFileCacheStore<SystemClock> {
    /// Opens the cache file at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>, expiry: Expiry) -> Result<Self> {
        Self::open_with_clock(path, expiry, SystemClock).await
    }
}

impl<C: Clock> JsonFileCacheStore<C> {
    /// Opens the cache file with a custom clock.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file
    /// also yields an empty store, with a warning: the cache is an
    /// optimisation and must not keep the client from starting.
    pub async fn open_with_clock(
        path: impl Into<PathBuf>,
        expiry: Expiry,
        clock: C,
    ) -> Result<Self> {
        let path = path.into();
        let entries = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) if file.version == FORMAT_VERSION => {
                    for (url, stored) in file.entries {
                        entries.insert(url.clone(), stored.into_entry(url));
                    }
                    debug!(path = %path.display(), entries = entries.len(), "loaded cache file");
                }
                Ok(file) => {
                    warn!(
                        path = %path.display(),
                        version = file.version,
                        "unsupported cache file version, starting empty"
                    );
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt cache file, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file yet");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache file, starting empty");
            }
        }

        Ok(Self {
            path,
            entries,
            expiry,
            clock,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current entries, hit counts included, to disk.
    async fn write_file(&self) -> Result<()> {
        let _guard = self.writer.lock().await;

        // Snapshot under the writer lock so the last writer always carries
        // every entry inserted before it.
        let file = CacheFile {
            version: FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|item| (item.key().clone(), StoredEntry::from_entry(item.value())))
                .collect(),
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| CacheError::Serialization(format!("failed to encode cache file: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        trace!(path = %self.path.display(), entries = file.entries.len(), "wrote cache file");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl<C: Clock> CacheStore for JsonFileCacheStore<C> {
    async fn get(&self, url: &CanonicalUrl) -> Result<Option<CacheEntry>> {
        let Some(mut entry) = self.entries.get_mut(url) else {
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
        self.entries.insert(url.clone(), entry.clone());
        self.write_file().await?;
        debug!(url = %url, provider = provider_id, "persisted short url");
        Ok(entry)
    }

    async fn purge_expired(&self) -> Result<usize> {
        if self.expiry.ttl().is_none() {
            return Ok(0);
        }

        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !self.expiry.is_expired(entry, now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            self.write_file().await?;
        }
        debug!(removed, "purged expired cache entries");
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    async fn flush(&self) -> Result<()> {
        self.write_file().await
    }
}
