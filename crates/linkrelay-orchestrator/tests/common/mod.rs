#![allow(dead_code)]

use async_trait::async_trait;
use linkrelay_core::cache::Result as CacheResult;
use linkrelay_core::{CacheEntry, CacheError, CacheStore, CanonicalUrl};
use linkrelay_orchestrator::OrchestratorConfig;
use linkrelay_provider::{
    ProviderDescriptor, ProviderKind, RateLimit, RawResponse, RequestSpec, Transport,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the scripted transport answers to one request.
pub struct Reply {
    pub delay: Duration,
    pub result: Result<RawResponse, TransportError>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(RawResponse::new(status, "")),
        }
    }

    /// A TinyURL-style plain-text success for `request`.
    pub fn shortened(request: &RequestSpec) -> Self {
        let host = request.host().unwrap_or_default();
        let source = source_url(request).unwrap_or_default();
        Self {
            delay: Duration::ZERO,
            result: Ok(RawResponse::new(200, format!("https://{host}/r{}", source.len()))),
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Script = dyn Fn(&RequestSpec) -> Reply + Send + Sync;

/// An in-process [`Transport`] that answers from a closure and records every
/// request it sees.
pub struct ScriptedTransport {
    script: Box<Script>,
    calls: Mutex<Vec<RequestSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: impl Fn(&RequestSpec) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Every request succeeds.
    pub fn always_ok() -> Arc<Self> {
        Self::new(Reply::shortened)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, host: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.host().as_deref() == Some(host))
            .count()
    }

    /// Hosts contacted, in call order.
    pub fn hosts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(RequestSpec::host)
            .collect()
    }

    /// Highest number of requests that were outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        self.calls.lock().push(request.clone());
        let reply = (self.script)(request);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _decrement = DecrementOnDrop(&self.in_flight);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

struct DecrementOnDrop<'a>(&'a AtomicUsize);

impl Drop for DecrementOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A cache whose every operation fails, counting the calls it refused.
#[derive(Debug, Default)]
pub struct FailingCache {
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _url: &CanonicalUrl) -> CacheResult<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Operation("disk on fire".to_string()))
    }

    async fn put(&self, _url: &CanonicalUrl, _short_url: &str, _provider_id: &str) -> CacheResult<CacheEntry> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::other("read-only filesystem").into())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        Ok(0)
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(0)
    }
}

/// The `url` query parameter of a TinyURL-style request.
pub fn source_url(request: &RequestSpec) -> Option<String> {
    let parsed = url::Url::parse(&request.url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// A TinyURL-protocol provider served from `https://{id}.test`.
pub fn provider(id: &str, priority: i32) -> ProviderDescriptor {
    ProviderDescriptor::builder()
        .id(id)
        .priority(priority)
        .service(ProviderKind::TinyUrl)
        .base_url(format!("https://{id}.test"))
        .build()
}

pub fn limited_provider(id: &str, priority: i32, max_requests: u32, window_seconds: u64) -> ProviderDescriptor {
    let mut descriptor = provider(id, priority);
    descriptor.rate_limit = RateLimit::new(max_requests, window_seconds);
    descriptor
}

/// Short backoff delays so paused-clock tests stay readable.
pub fn config(providers: Vec<ProviderDescriptor>) -> OrchestratorConfig {
    OrchestratorConfig::builder()
        .providers(providers)
        .base_delay_ms(10)
        .max_delay_ms(100)
        .build()
}

pub fn canonical(url: &str) -> CanonicalUrl {
    CanonicalUrl::parse(url).unwrap()
}
