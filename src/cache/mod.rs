//! Cache Module
//!
//! Provides bounded in-memory caching with per-entry TTL and
//! oldest-insertion eviction.

mod entry;
mod order;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use shared::TtlCache;
pub use stats::CacheStats;
pub use store::CacheStore;
