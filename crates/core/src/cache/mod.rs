//! In-memory cache for rendered pages.
//!
//! This module provides a process-local, TTL-bounded cache. It supports:
//!
//! - Deterministic keys derived from the target URL and extension set
//! - Lazy expiry on read plus an explicit sweep for background eviction
//! - Hit/miss counters that survive `clear()`
//!
//! Nothing is persisted; a restart starts with an empty cache.

pub mod key;
pub mod store;

pub use key::compute_cache_key;
pub use store::{CacheStats, CacheStore};
