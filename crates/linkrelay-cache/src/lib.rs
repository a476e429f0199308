//! Cache store implementations for linkrelay.
//!
//! [`InMemoryCacheStore`] keeps entries for the lifetime of the process;
//! [`JsonFileCacheStore`] persists them to a JSON mapping file so they
//! survive restarts.

pub mod file;
pub mod memory;

pub use file::JsonFileCacheStore;
pub use linkrelay_core::{CacheEntry, CacheError, CacheStore, Expiry};
pub use memory::InMemoryCacheStore;
