use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use linkrelay_core::Expiry;
use linkrelay_provider::{ProviderDescriptor, ProviderKind, RateLimit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_USER_AGENT: &str = concat!("linkrelay/", env!("CARGO_PKG_VERSION"));

/// Options recognised by the [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Providers, tried in ascending `priority`; ties keep list order.
    #[builder(default)]
    pub providers: Vec<ProviderDescriptor>,
    /// Attempts per provider for transient failures.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
    #[builder(default = DEFAULT_BASE_DELAY_MS)]
    pub base_delay_ms: u64,
    #[builder(default = DEFAULT_MAX_DELAY_MS)]
    pub max_delay_ms: u64,
    /// `None` keeps cache entries forever.
    #[builder(default, setter(strip_option))]
    pub cache_ttl_seconds: Option<u64>,
    /// Wait for a rate-limited provider instead of failing over.
    #[builder(default)]
    pub wait_for_rate_limit: bool,
    /// Upper bound on URLs resolved at once; `None` is unbounded.
    #[builder(default, setter(strip_option))]
    pub batch_concurrency_limit: Option<usize>,
    /// Per-attempt timeout; an expired attempt is a transient failure.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    #[builder(default = DEFAULT_USER_AGENT.to_string(), setter(into))]
    pub user_agent: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OrchestratorConfig {
    /// Checks the configuration-time invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }
        if self.batch_concurrency_limit == Some(0) {
            return Err(ConfigError::InvalidConcurrencyLimit);
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.id.clone()));
            }
            let RateLimit {
                max_requests,
                window_seconds,
            } = provider.rate_limit;
            if max_requests == 0 || window_seconds == 0 {
                return Err(ConfigError::InvalidRateLimit {
                    provider: provider.id.clone(),
                    reason: format!(
                        "max_requests and window_seconds must be positive, got {max_requests}/{window_seconds}s"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Falls back to the keyless services, TinyURL then is.gd, when no
    /// providers are configured.
    pub fn with_default_providers(mut self) -> Self {
        if self.providers.is_empty() {
            self.providers = default_providers();
        }
        self
    }

    pub fn cache_expiry(&self) -> Expiry {
        Expiry::from_seconds(self.cache_ttl_seconds)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay(), self.max_delay())
    }
}

pub fn default_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::builder()
            .id("tinyurl")
            .priority(1)
            .service(ProviderKind::TinyUrl)
            .build(),
        ProviderDescriptor::builder()
            .id("isgd")
            .priority(2)
            .service(ProviderKind::IsGd)
            .build(),
    ]
}

/// Where the cache lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// JSON mapping file; the cache is in-memory when unset.
    pub path: Option<PathBuf>,
}

/// Contents of a YAML settings file: the orchestrator options at the top
/// level plus a `cache` section.
///
/// ```yaml
/// max_retries: 2
/// cache_ttl_seconds: 86400
/// cache:
///   path: /var/cache/linkrelay/cache.json
/// providers:
///   - id: tinyurl
///     priority: 1
///     service: { type: tinyurl }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
