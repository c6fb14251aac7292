//! Shared Instances
//!
//! One cache per logical purpose plus the upstream batcher, built once at
//! startup and handed to consumers by clone.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::adapters::{with_batching, with_cache, BoxFuture};
use crate::batch::{Batcher, Processor};
use crate::cache::{CacheStats, TtlCache};
use crate::config::Config;
use crate::error::BatchError;
use crate::keys::{canonical_key, status_key, ANALYSIS_PREFIX};

/// Batcher used for calls to the upstream service.
pub type UpstreamBatcher = Batcher<Value, Value, anyhow::Error>;

/// Names under which the caches are exposed to operators.
pub const CACHE_NAMES: [&str; 3] = ["analysis", "prompts", "status"];

// == Shield ==
/// The process-wide cache and batcher instances.
#[derive(Debug, Clone)]
pub struct Shield {
    /// Upstream results keyed by analysis payload
    pub analysis: TtlCache<Value>,
    /// Optimized prompts keyed by prompt and preferences
    pub prompts: TtlCache<String>,
    /// Provider status lookups
    pub status: TtlCache<Value>,
    /// Coalescer in front of the upstream service
    pub upstream: UpstreamBatcher,
}

impl Shield {
    pub fn from_config(config: &Config) -> Self {
        Self {
            analysis: TtlCache::new(
                config.analysis_cache_max_entries,
                Duration::from_secs(config.analysis_cache_ttl),
            ),
            prompts: TtlCache::new(
                config.prompt_cache_max_entries,
                Duration::from_secs(config.prompt_cache_ttl),
            ),
            status: TtlCache::new(
                config.status_cache_max_entries,
                Duration::from_secs(config.status_cache_ttl),
            ),
            upstream: Batcher::new(config.batch_config()),
        }
    }

    // == Cache Lookup By Name ==
    pub fn cache_stats(&self, name: &str) -> Option<CacheStats> {
        match name {
            "analysis" => Some(self.analysis.stats()),
            "prompts" => Some(self.prompts.stats()),
            "status" => Some(self.status.stats()),
            _ => None,
        }
    }

    pub fn all_cache_stats(&self) -> BTreeMap<String, CacheStats> {
        CACHE_NAMES
            .iter()
            .filter_map(|name| Some((name.to_string(), self.cache_stats(name)?)))
            .collect()
    }

    /// Clears the named cache. Returns `false` for an unknown name.
    pub fn clear_cache(&self, name: &str) -> bool {
        match name {
            "analysis" => self.analysis.clear(),
            "prompts" => self.prompts.clear(),
            "status" => self.status.clear(),
            _ => return false,
        }
        true
    }

    // == Analysis ==
    /// Memoized, coalesced access to the upstream analysis call.
    ///
    /// Cache hits return immediately. Concurrent misses for the same payload
    /// share one group, so `processor` sees each distinct payload batch once
    /// per flush.
    pub fn analysis_fn<Pr>(
        &self,
        processor: Pr,
    ) -> impl Fn(Value) -> BoxFuture<Result<Value, BatchError<anyhow::Error>>> + Clone
    where
        Pr: Processor<Value, Value, anyhow::Error> + Clone,
    {
        let key = |payload: &Value| format!("{ANALYSIS_PREFIX}{}", canonical_key(payload));
        with_cache(
            self.analysis.clone(),
            key,
            None,
            with_batching(self.upstream.clone(), key, processor),
        )
    }

    // == Status ==
    /// Memoized provider status lookup.
    pub fn status_fn<F>(
        &self,
        lookup: F,
    ) -> impl Fn(String) -> BoxFuture<Result<Value, anyhow::Error>> + Clone
    where
        F: Fn(String) -> BoxFuture<Result<Value, anyhow::Error>> + Clone,
    {
        with_cache(
            self.status.clone(),
            |provider: &String| status_key(provider),
            None,
            lookup,
        )
    }
}
