//! Upstream Shield - caching and request coalescing for rate-limited services
//!
//! Provides a bounded TTL cache, a batching coalescer that folds concurrent
//! calls sharing a key into one upstream invocation, and adapters that wrap
//! plain async functions with either.

pub mod adapters;
pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod shield;

pub use adapters::{with_batching, with_cache, BoxFuture};
pub use api::AppState;
pub use batch::{BatchConfig, Batcher, Pending, Processor};
pub use cache::TtlCache;
pub use config::Config;
pub use error::{BatchError, KeyError};
pub use keys::serialize_key;
pub use shield::Shield;
