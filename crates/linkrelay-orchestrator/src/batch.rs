use linkrelay_core::Outcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// The result for one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlResult {
    /// The URL exactly as the caller passed it.
    pub input_url: String,
    pub outcome: Outcome,
    /// The provider that produced the short URL. On a cache hit this is the
    /// provider recorded in the cache entry.
    pub provider_used: Option<String>,
    pub cache_hit: bool,
    pub elapsed_ms: u64,
    /// Provider attempts made for this URL; zero for cache hits, invalid
    /// input and coalesced duplicates.
    pub attempts: u32,
}

impl UrlResult {
    pub fn cancelled(input_url: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            input_url: input_url.into(),
            outcome: Outcome::Cancelled,
            provider_used: None,
            cache_hit: false,
            elapsed_ms,
            attempts: 0,
        }
    }

    pub fn invalid(input_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input_url: input_url.into(),
            outcome: Outcome::InvalidInput {
                reason: reason.into(),
            },
            provider_used: None,
            cache_hit: false,
            elapsed_ms: 0,
            attempts: 0,
        }
    }

    pub fn short_url(&self) -> Option<&str> {
        self.outcome.short_url()
    }
}

/// One [`UrlResult`] per input URL, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    results: Vec<UrlResult>,
}

impl BatchResult {
    pub fn new(results: Vec<UrlResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UrlResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UrlResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<UrlResult> {
        self.results
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.results.len(),
            ..BatchSummary::default()
        };

        for result in &self.results {
            if result.cache_hit {
                summary.cache_hits += 1;
            }
            match &result.outcome {
                Outcome::Success { .. } => {
                    summary.successful += 1;
                    if let (false, Some(provider)) = (result.cache_hit, &result.provider_used) {
                        *summary.provider_successes.entry(provider.clone()).or_default() += 1;
                    }
                }
                Outcome::Cancelled => summary.cancelled += 1,
                Outcome::InvalidInput { .. } | Outcome::Exhausted { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

impl std::ops::Index<usize> for BatchResult {
    type Output = UrlResult;

    fn index(&self, index: usize) -> &Self::Output {
        &self.results[index]
    }
}

impl IntoIterator for BatchResult {
    type Item = UrlResult;
    type IntoIter = std::vec::IntoIter<UrlResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a UrlResult;
    type IntoIter = std::slice::Iter<'a, UrlResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Aggregate figures for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub cache_hits: usize,
    /// Fresh resolutions per provider; cache hits are not counted.
    pub provider_successes: BTreeMap<String, usize>,
}

impl BatchSummary {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total as f64
    }
}
