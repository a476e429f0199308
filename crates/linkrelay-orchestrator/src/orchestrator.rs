use crate::batch::{BatchResult, UrlResult};
use crate::config::OrchestratorConfig;
use crate::error::ConfigError;
use crate::inflight::{Claim, Inflight};
use crate::rate_limit::{Acquisition, ProviderRateLimiter};
use crate::retry::RetryPolicy;
use crate::stats::{Stats, StatsSnapshot};
use linkrelay_core::{
    AttemptOutcome, AttemptRecord, CacheEntry, CacheStore, CanonicalUrl, Clock, Outcome,
    ProviderFailure, SystemClock,
};
use linkrelay_provider::{Provider, RequestSpec, Transport};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// What every caller waiting on the same canonical URL receives.
#[derive(Debug, Clone)]
struct Resolution {
    outcome: Outcome,
    provider_used: Option<String>,
    cache_hit: bool,
}

impl Resolution {
    fn cached(entry: CacheEntry) -> Self {
        Self {
            outcome: Outcome::Success {
                short_url: entry.short_url,
            },
            provider_used: Some(entry.provider_id),
            cache_hit: true,
        }
    }

    fn fresh(short_url: String, provider_id: &str) -> Self {
        Self {
            outcome: Outcome::Success { short_url },
            provider_used: Some(provider_id.to_string()),
            cache_hit: false,
        }
    }

    fn exhausted(failures: Vec<ProviderFailure>) -> Self {
        Self {
            outcome: Outcome::Exhausted { failures },
            provider_used: None,
            cache_hit: false,
        }
    }

    fn into_result(self, input_url: &str, started: Instant, attempts: u32) -> UrlResult {
        UrlResult {
            input_url: input_url.to_string(),
            outcome: self.outcome,
            provider_used: self.provider_used,
            cache_hit: self.cache_hit,
            elapsed_ms: elapsed_ms(started),
            attempts,
        }
    }
}

/// Per-URL state machine.
#[derive(Debug)]
enum State {
    CacheCheck,
    ProviderAttempt { index: usize, attempt: u32 },
    Done(Resolution),
}

struct Shared<S, T> {
    providers: Vec<Provider>,
    cache: S,
    transport: T,
    limiter: ProviderRateLimiter,
    retry: RetryPolicy,
    request_timeout: Duration,
    wait_for_rate_limit: bool,
    batch_concurrency_limit: Option<usize>,
    inflight: Arc<Inflight<Resolution>>,
    stats: Stats,
    clock: Arc<dyn Clock>,
}

/// Shortens URLs through a prioritised list of providers.
///
/// Every lookup goes through the cache first. On a miss the providers are
/// tried in ascending priority: transient failures are retried against the
/// same provider with exponential backoff, permanent failures and spent
/// retry budgets fail over to the next one. Concurrent requests for the same
/// canonical URL share a single resolution.
///
/// Cloning is cheap and every clone shares the cache, rate limiters, in-flight
/// registry and statistics.
pub struct Orchestrator<S, T> {
    shared: Arc<Shared<S, T>>,
}

impl<S, T> Clone for Orchestrator<S, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: CacheStore, T: Transport> Orchestrator<S, T> {
    /// Builds an orchestrator after validating `config`.
    pub fn new(config: OrchestratorConfig, cache: S, transport: T) -> Result<Self, ConfigError> {
        Self::with_clock(config, cache, transport, SystemClock)
    }

    /// Like [`new`](Self::new), stamping attempts with time read from `clock`.
    pub fn with_clock(
        config: OrchestratorConfig,
        cache: S,
        transport: T,
        clock: impl Clock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut providers: Vec<Provider> =
            config.providers.iter().map(Provider::from_descriptor).collect();
        // stable, so equal priorities keep their configured order
        providers.sort_by_key(Provider::priority);

        let limiter = ProviderRateLimiter::new(&providers)?;
        let stats = Stats::new(providers.iter().map(Provider::id));

        info!(
            providers = ?providers.iter().map(Provider::id).collect::<Vec<_>>(),
            max_retries = config.max_retries,
            wait_for_rate_limit = config.wait_for_rate_limit,
            "orchestrator ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                providers,
                cache,
                transport,
                limiter,
                retry: config.retry_policy(),
                request_timeout: config.request_timeout(),
                wait_for_rate_limit: config.wait_for_rate_limit,
                batch_concurrency_limit: config.batch_concurrency_limit,
                inflight: Arc::new(Inflight::new()),
                stats,
                clock: Arc::new(clock),
            }),
        })
    }

    /// Providers in the order they are tried.
    pub fn providers(&self) -> &[Provider] {
        &self.shared.providers
    }

    pub fn cache(&self) -> &S {
        &self.shared.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Shortens a single URL.
    pub async fn shorten(&self, url: &str) -> UrlResult {
        let started = Instant::now();
        let result = match CanonicalUrl::parse(url) {
            Ok(canonical) => self.shared.resolve(url, canonical, started).await,
            Err(e) => UrlResult::invalid(url, e.to_string()),
        };
        self.shared.stats.record_url(&result);
        if result.cache_hit {
            self.shared.persist_hits().await;
        }
        result
    }

    /// Shortens every URL in `urls`, returning results in input order.
    pub async fn shorten_batch<U: AsRef<str>>(&self, urls: &[U]) -> BatchResult {
        self.shorten_batch_until(urls, std::future::pending()).await
    }

    /// Like [`shorten_batch`](Self::shorten_batch), but cancels whatever is
    /// still unresolved once `timeout` elapses.
    pub async fn shorten_batch_with_timeout<U: AsRef<str>>(
        &self,
        urls: &[U],
        timeout: Duration,
    ) -> BatchResult {
        self.shorten_batch_until(urls, tokio::time::sleep(timeout)).await
    }

    /// Shortens every URL in `urls` until `cancel` completes.
    ///
    /// URLs that reached a terminal state before cancellation keep their
    /// result; all others are reported as [`Outcome::Cancelled`] and their
    /// in-flight provider calls are aborted.
    pub async fn shorten_batch_until<U, F>(&self, urls: &[U], cancel: F) -> BatchResult
    where
        U: AsRef<str>,
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut slots: Vec<Option<UrlResult>> = vec![None; urls.len()];

        // one task per distinct canonical URL; duplicates share its slot list
        let mut groups: Vec<(CanonicalUrl, Vec<usize>)> = Vec::new();
        let mut by_url: HashMap<CanonicalUrl, usize> = HashMap::new();
        for (index, input) in urls.iter().enumerate() {
            let input = input.as_ref();
            match CanonicalUrl::parse(input) {
                Ok(canonical) => match by_url.get(&canonical) {
                    Some(&group) => groups[group].1.push(index),
                    None => {
                        by_url.insert(canonical.clone(), groups.len());
                        groups.push((canonical, vec![index]));
                    }
                },
                Err(e) => {
                    debug!(input, error = %e, "rejecting invalid url");
                    slots[index] = Some(UrlResult::invalid(input, e.to_string()));
                }
            }
        }

        let semaphore = self
            .shared
            .batch_concurrency_limit
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut tasks = JoinSet::new();
        let mut task_groups = HashMap::with_capacity(groups.len());
        for (group, (canonical, indices)) in groups.iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let semaphore = semaphore.clone();
            let canonical = canonical.clone();
            let input = urls[indices[0]].as_ref().to_string();

            let handle = tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                shared.resolve(&input, canonical, started).await
            });
            task_groups.insert(handle.id(), group);
        }

        let mut cancel = std::pin::pin!(cancel);
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => match joined {
                    Some(joined) => fill_group(&mut slots, &groups, &task_groups, urls, joined, started),
                    None => break,
                },
                () = &mut cancel => {
                    cancelled = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        if cancelled {
            // keep results that landed before the abort took effect
            while let Some(joined) = tasks.join_next_with_id().await {
                fill_group(&mut slots, &groups, &task_groups, urls, joined, started);
            }
        }

        let elapsed = elapsed_ms(started);
        let results: Vec<UrlResult> = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, input)| slot.unwrap_or_else(|| UrlResult::cancelled(input.as_ref(), elapsed)))
            .collect();

        for result in &results {
            self.shared.stats.record_url(result);
        }

        let batch = BatchResult::new(results);
        let summary = batch.summary();
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            cancelled = summary.cancelled,
            cache_hits = summary.cache_hits,
            elapsed_ms = elapsed,
            "batch complete"
        );
        if summary.cache_hits > 0 {
            self.shared.persist_hits().await;
        }
        batch
    }
}

fn fill_group<U: AsRef<str>>(
    slots: &mut [Option<UrlResult>],
    groups: &[(CanonicalUrl, Vec<usize>)],
    task_groups: &HashMap<tokio::task::Id, usize>,
    urls: &[U],
    joined: Result<(tokio::task::Id, UrlResult), tokio::task::JoinError>,
    started: Instant,
) {
    let (id, result) = match joined {
        Ok((id, result)) => (id, result),
        Err(e) if e.is_cancelled() => return,
        Err(e) => {
            let Some(&group) = task_groups.get(&e.id()) else {
                return;
            };
            let (canonical, _) = &groups[group];
            warn!(url = %canonical, error = %e, "resolution task panicked");
            let failed = UrlResult {
                input_url: String::new(),
                outcome: Outcome::Exhausted {
                    failures: vec![ProviderFailure {
                        provider_id: "internal".to_string(),
                        reason: "internal error".to_string(),
                    }],
                },
                provider_used: None,
                cache_hit: false,
                elapsed_ms: elapsed_ms(started),
                attempts: 0,
            };
            (e.id(), failed)
        }
    };

    let Some(&group) = task_groups.get(&id) else {
        return;
    };
    let (_, indices) = &groups[group];
    for (n, &index) in indices.iter().enumerate() {
        let mut slot = result.clone();
        slot.input_url = urls[index].as_ref().to_string();
        if n > 0 {
            slot.attempts = 0;
        }
        slots[index] = Some(slot);
    }
}

impl<S: CacheStore, T: Transport> Shared<S, T> {
    /// Hit counts only live in memory until the store is flushed.
    async fn persist_hits(&self) {
        if let Err(e) = self.cache.flush().await {
            warn!(error = %e, "failed to persist cache hit counts");
        }
    }

    /// Resolves `url`, or joins an in-flight resolution of it.
    async fn resolve(&self, input: &str, url: CanonicalUrl, started: Instant) -> UrlResult {
        loop {
            match self.inflight.claim(&url) {
                Claim::Owner(guard) => {
                    let (resolution, attempts) = self.run(&url).await;
                    guard.complete(resolution.clone());
                    return resolution.into_result(input, started, attempts);
                }
                Claim::Waiter(waiter) => {
                    trace!(url = %url, "joining in-flight resolution");
                    if let Some(resolution) = waiter.wait().await {
                        return resolution.into_result(input, started, 0);
                    }
                    // the owner was aborted; take over
                    debug!(url = %url, "in-flight owner went away, retrying claim");
                }
            }
        }
    }

    async fn run(&self, url: &CanonicalUrl) -> (Resolution, u32) {
        let mut attempts = 0;
        let mut failures = Vec::new();
        let mut state = State::CacheCheck;

        loop {
            state = match state {
                State::CacheCheck => self.check_cache(url).await,
                State::ProviderAttempt { index, attempt } => {
                    match self.providers.get(index) {
                        Some(provider) => {
                            self.attempt(url, index, provider, attempt, &mut attempts, &mut failures)
                                .await
                        }
                        None => {
                            warn!(url = %url, failures = failures.len(), "all providers failed");
                            State::Done(Resolution::exhausted(std::mem::take(&mut failures)))
                        }
                    }
                }
                State::Done(resolution) => return (resolution, attempts),
            };
        }
    }

    async fn check_cache(&self, url: &CanonicalUrl) -> State {
        let first = State::ProviderAttempt {
            index: 0,
            attempt: 1,
        };
        match self.cache.get(url).await {
            Ok(Some(entry)) => {
                debug!(url = %url, provider = %entry.provider_id, "served from cache");
                State::Done(Resolution::cached(entry))
            }
            Ok(None) => first,
            Err(e) => {
                warn!(url = %url, error = %e, "cache lookup failed, treating as miss");
                first
            }
        }
    }

    async fn attempt(
        &self,
        url: &CanonicalUrl,
        index: usize,
        provider: &Provider,
        attempt: u32,
        attempts: &mut u32,
        failures: &mut Vec<ProviderFailure>,
    ) -> State {
        let request = match provider.build_request(url) {
            Ok(request) => request,
            Err(rejection) => {
                let reason = rejection.reason().unwrap_or("rejected locally").to_string();
                debug!(url = %url, provider = %provider.id(), %reason, "provider rejected url locally");
                return self.fail_over(url, index, provider, reason, failures);
            }
        };

        if let Acquisition::Denied { retry_after } = self.limiter.try_acquire(provider.id()) {
            if self.wait_for_rate_limit {
                debug!(
                    url = %url,
                    provider = %provider.id(),
                    wait_ms = duration_ms(retry_after),
                    "rate limited, waiting"
                );
                tokio::time::sleep(retry_after).await;
                return State::ProviderAttempt { index, attempt };
            }
            let reason = format!("rate limited locally, next slot in {}ms", retry_after.as_millis());
            debug!(url = %url, provider = %provider.id(), "rate limited, failing over");
            return self.fail_over(url, index, provider, reason, failures);
        }

        *attempts += 1;
        let record = AttemptRecord {
            url: url.clone(),
            provider_id: provider.id().to_string(),
            attempt_number: attempt,
            started_at: self.clock.now(),
            outcome: self.send(provider, &request).await,
        };
        trace!(
            url = %record.url,
            provider = %record.provider_id,
            attempt = record.attempt_number,
            started_at = %record.started_at,
            outcome = ?record.outcome,
            "attempt finished"
        );
        self.stats.record_attempt(&record);

        match record.outcome {
            AttemptOutcome::Success(short_url) => {
                debug!(url = %url, provider = %provider.id(), attempt, "shortened");
                if let Err(e) = self.cache.put(url, &short_url, provider.id()).await {
                    warn!(url = %url, error = %e, "failed to cache short url");
                }
                State::Done(Resolution::fresh(short_url, provider.id()))
            }
            ref outcome if self.retry.should_retry(attempt, outcome) => {
                let delay = self.retry.next_delay(attempt);
                debug!(
                    url = %url,
                    provider = %provider.id(),
                    attempt,
                    delay_ms = duration_ms(delay),
                    reason = outcome.reason().unwrap_or_default(),
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                State::ProviderAttempt {
                    index,
                    attempt: attempt + 1,
                }
            }
            AttemptOutcome::TransientFailure(reason) | AttemptOutcome::PermanentFailure(reason) => {
                self.fail_over(url, index, provider, reason, failures)
            }
        }
    }

    async fn send(&self, provider: &Provider, request: &RequestSpec) -> AttemptOutcome {
        match tokio::time::timeout(self.request_timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => provider.parse_response(&response),
            Ok(Err(e)) => AttemptOutcome::transient(e.to_string()),
            Err(_) => AttemptOutcome::transient(format!(
                "timed out after {}ms",
                self.request_timeout.as_millis()
            )),
        }
    }

    fn fail_over(
        &self,
        url: &CanonicalUrl,
        index: usize,
        provider: &Provider,
        reason: String,
        failures: &mut Vec<ProviderFailure>,
    ) -> State {
        failures.push(ProviderFailure {
            provider_id: provider.id().to_string(),
            reason,
        });
        if let Some(next) = self.providers.get(index + 1) {
            self.stats.record_failover();
            debug!(url = %url, from = %provider.id(), to = %next.id(), "failing over");
        }
        State::ProviderAttempt {
            index: index + 1,
            attempt: 1,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
