//! Resilient multi-provider URL shortening.
//!
//! [`Orchestrator`] ties the pieces together: a [`CacheStore`] consulted
//! before any network call, per-provider rate limiters, a pure
//! [`RetryPolicy`] and failover across providers in priority order. Batches
//! fan out one task per distinct canonical URL and come back in input order.
//!
//! ```no_run
//! use linkrelay_cache::InMemoryCacheStore;
//! use linkrelay_orchestrator::{Orchestrator, OrchestratorConfig};
//! use linkrelay_provider::HttpTransport;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = OrchestratorConfig::default().with_default_providers();
//! let transport = HttpTransport::new(config.request_timeout(), &config.user_agent)?;
//! let orchestrator = Orchestrator::new(config, InMemoryCacheStore::new(), transport)?;
//!
//! let batch = orchestrator
//!     .shorten_batch(&["https://example.com/a", "https://example.com/b"])
//!     .await;
//! for result in &batch {
//!     println!("{} -> {}", result.input_url, result.outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`CacheStore`]: linkrelay_core::CacheStore

pub mod batch;
pub mod config;
pub mod error;
pub mod inflight;
pub mod orchestrator;
pub mod rate_limit;
pub mod retry;
pub mod stats;

pub use batch::{BatchResult, BatchSummary, UrlResult};
pub use config::{CacheSettings, OrchestratorConfig, Settings};
pub use error::ConfigError;
pub use orchestrator::Orchestrator;
pub use rate_limit::{Acquisition, ProviderRateLimiter};
pub use retry::RetryPolicy;
pub use stats::{ProviderHealth, StatsSnapshot};
