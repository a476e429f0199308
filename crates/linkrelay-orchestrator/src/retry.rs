use linkrelay_core::AttemptOutcome;
use rand::Rng;
use std::time::Duration;

/// When to retry a provider and how long to wait in between.
///
/// Pure apart from the jitter source, so the schedule can be checked
/// without a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per provider, the first one included.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// `attempt` is the 1-based number of the attempt that produced `outcome`.
    pub fn should_retry(&self, attempt: u32, outcome: &AttemptOutcome) -> bool {
        outcome.is_transient() && attempt < self.max_retries
    }

    /// The un-jittered delay before retry `attempt`: `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// The delay before retry `attempt` with `jitter` added, where `jitter`
    /// is a fraction in `[0, 1)` of `base_delay`. Never exceeds `max_delay`.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let jitter = self.base_delay.mul_f64(jitter.clamp(0.0, 1.0));
        self.backoff_duration(attempt)
            .saturating_add(jitter)
            .min(self.max_delay)
    }

    /// [`backoff_with_jitter`](Self::backoff_with_jitter) with a random jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random::<f64>();
        self.backoff_with_jitter(attempt, jitter)
    }
}
