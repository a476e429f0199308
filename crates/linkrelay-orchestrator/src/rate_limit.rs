use crate::error::ConfigError;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use linkrelay_provider::{Provider, RateLimit};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Result of asking for a request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Granted,
    /// No slot is free; one will be after `retry_after`.
    Denied { retry_after: Duration },
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted)
    }
}

/// One GCRA limiter per provider, allowing `max_requests` per
/// `window_seconds` with the whole window available as a burst.
///
/// The provider set is fixed at construction, so the map itself is never
/// written afterwards; every limiter updates its state with atomic
/// compare-and-swap and can be shared by any number of tasks.
pub struct ProviderRateLimiter<C: Clock = DefaultClock> {
    limiters: HashMap<String, DirectLimiter<C>>,
    clock: C,
}

impl ProviderRateLimiter<DefaultClock> {
    pub fn new(providers: &[Provider]) -> Result<Self, ConfigError> {
        Self::with_clock(providers, DefaultClock::default())
    }
}

impl<C: Clock + Clone> ProviderRateLimiter<C> {
    pub fn with_clock(providers: &[Provider], clock: C) -> Result<Self, ConfigError> {
        let mut limiters = HashMap::with_capacity(providers.len());
        for provider in providers {
            let quota = quota_for(provider.id(), provider.rate_limit())?;
            limiters.insert(
                provider.id().to_string(),
                RateLimiter::direct_with_clock(quota, clock.clone()),
            );
        }
        Ok(Self { limiters, clock })
    }

    /// Takes one slot for `provider_id`. Unknown ids are never limited.
    pub fn try_acquire(&self, provider_id: &str) -> Acquisition {
        let Some(limiter) = self.limiters.get(provider_id) else {
            return Acquisition::Granted;
        };
        match limiter.check() {
            Ok(()) => Acquisition::Granted,
            Err(not_until) => Acquisition::Denied {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }
}

impl<C: Clock> std::fmt::Debug for ProviderRateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRateLimiter")
            .field("providers", &self.limiters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn quota_for(provider_id: &str, limit: RateLimit) -> Result<Quota, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRateLimit {
        provider: provider_id.to_string(),
        reason: reason.to_string(),
    };

    let burst = NonZeroU32::new(limit.max_requests).ok_or_else(|| invalid("max_requests must be positive"))?;
    if limit.window_seconds == 0 {
        return Err(invalid("window_seconds must be positive"));
    }

    let period = Duration::from_secs(limit.window_seconds) / limit.max_requests;
    let quota = Quota::with_period(period).ok_or_else(|| invalid("window is too short for max_requests"))?;
    Ok(quota.allow_burst(burst))
}
