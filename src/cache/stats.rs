//! Cache Statistics Module
//!
//! Lifetime counters kept by the store plus the snapshot handed to callers.

use std::time::Duration;

use serde::{Serialize, Serializer};

// == Cache Counters ==
/// Lifetime counters. `delete` and `clear` never decrease them.
#[derive(Debug, Clone, Default)]
pub(crate) struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Cache Stats ==
/// Point-in-time view of a cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Resident entries, expired-but-unvisited ones included
    pub size: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Sum of the hit counters of resident entries
    pub total_hits: u64,
    /// Mean age of resident entries, without re-checking TTL
    #[serde(rename = "average_age_ms", serialize_with = "serialize_millis")]
    pub average_age: Duration,
    /// Lifetime successful reads
    pub hits: u64,
    /// Lifetime reads that found nothing or an expired entry
    pub misses: u64,
    /// Lifetime capacity evictions
    pub evictions: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the lifetime hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}
