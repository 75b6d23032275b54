//! Query Cache
//!
//! TTL-based key/value cache shared by the registry's name lookups and the
//! performance monitor.

pub mod query_cache;
pub mod query_cache_data;

pub use query_cache::QueryCache;
pub use query_cache_data::{CacheStats, QueryCacheEntry, TuningSummary};
