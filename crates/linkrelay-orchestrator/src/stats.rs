use crate::batch::UrlResult;
use dashmap::DashMap;
use jiff::Timestamp;
use linkrelay_core::{AttemptRecord, Outcome};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct ProviderCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
    last_attempt_at: Option<Timestamp>,
}

/// Cumulative counters for one orchestrator, shared by all its tasks.
#[derive(Debug, Default)]
pub struct Stats {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    failovers: AtomicU64,
    providers: DashMap<String, ProviderCounters>,
}

impl Stats {
    pub fn new<'a>(provider_ids: impl IntoIterator<Item = &'a str>) -> Self {
        let stats = Self::default();
        for id in provider_ids {
            stats
                .providers
                .insert(id.to_string(), ProviderCounters::default());
        }
        stats
    }

    /// Records the terminal result of one input URL.
    pub fn record_url(&self, result: &UrlResult) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        counter!("linkrelay_requests_total").increment(1);

        if result.cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            counter!("linkrelay_cache_hits_total").increment(1);
        }

        match &result.outcome {
            Outcome::Success { .. } => {
                self.successful.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::InvalidInput { .. } | Outcome::Exhausted { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        histogram!("linkrelay_resolve_latency_ms").record(result.elapsed_ms as f64);
    }

    /// Records one provider attempt.
    pub fn record_attempt(&self, record: &AttemptRecord) {
        let provider_id = record.provider_id.as_str();
        let mut counters = self.providers.entry(provider_id.to_string()).or_default();
        counters.last_attempt_at = counters.last_attempt_at.max(Some(record.started_at));
        if record.outcome.is_success() {
            counters.successes.fetch_add(1, Ordering::Relaxed);
            counters.consecutive_failures.store(0, Ordering::Relaxed);
            counter!("linkrelay_provider_success_total", "provider" => provider_id.to_string())
                .increment(1);
        } else {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            counters.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            counter!("linkrelay_provider_failure_total", "provider" => provider_id.to_string())
                .increment(1);
        }
    }

    pub fn record_failover(&self) {
        self.failovers.fetch_add(1, Ordering::Relaxed);
        counter!("linkrelay_failovers_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let providers = self
            .providers
            .iter()
            .map(|item| {
                let c = item.value();
                (
                    item.key().clone(),
                    ProviderHealth {
                        successes: c.successes.load(Ordering::Relaxed),
                        failures: c.failures.load(Ordering::Relaxed),
                        consecutive_failures: c.consecutive_failures.load(Ordering::Relaxed),
                        last_attempt_at: c.last_attempt_at,
                    },
                )
            })
            .collect();

        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            providers,
        }
    }
}

/// Per-provider attempt counts. `consecutive_failures` resets on success
/// and serves as the provider's availability signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    /// Start of the most recent attempt against the provider.
    pub last_attempt_at: Option<Timestamp>,
}

impl ProviderHealth {
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 0.0;
        }
        self.successes as f64 / total as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub failovers: u64,
    pub providers: BTreeMap<String, ProviderHealth>,
}

impl StatsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_requests as f64
    }

    pub fn provider_successes(&self, provider_id: &str) -> u64 {
        self.providers
            .get(provider_id)
            .map_or(0, |health| health.successes)
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests: {}, successful: {}, failed: {}, cancelled: {}, cache hit rate: {:.1}%, failovers: {}",
            self.total_requests,
            self.successful,
            self.failed,
            self.cancelled,
            self.cache_hit_rate() * 100.0,
            self.failovers
        )?;
        for (id, health) in &self.providers {
            write!(
                f,
                "\n  {id}: {} ok, {} failed ({:.1}% success)",
                health.successes,
                health.failures,
                health.success_rate() * 100.0
            )?;
        }
        Ok(())
    }
}
