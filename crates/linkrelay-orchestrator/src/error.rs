use linkrelay_provider::TransportError;
use thiserror::Error;

/// Configuration-time failures. Request-time failures are never errors;
/// they are carried as [`Outcome`](linkrelay_core::Outcome) values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one provider must be configured")]
    NoProviders,
    #[error("provider id '{0}' is configured more than once")]
    DuplicateProvider(String),
    #[error("invalid rate limit for provider '{provider}': {reason}")]
    InvalidRateLimit { provider: String, reason: String },
    #[error("max_retries must be at least 1")]
    InvalidMaxRetries,
    #[error("batch_concurrency_limit must be at least 1")]
    InvalidConcurrencyLimit,
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
