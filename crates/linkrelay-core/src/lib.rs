//! Core types and traits for the linkrelay shortening client.
//!
//! This crate provides the types shared by the cache stores, the provider
//! adapters and the orchestrator: canonical URLs, cache entries, the
//! [`CacheStore`] contract and the tagged outcome types.

pub mod cache;
pub mod canonical;
pub mod clock;
pub mod error;
pub mod outcome;

pub use cache::{CacheEntry, CacheStore, Expiry};
pub use canonical::{canonicalize, CanonicalUrl};
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use error::{CacheError, CoreError};
pub use outcome::{AttemptOutcome, AttemptRecord, Outcome, ProviderFailure};
