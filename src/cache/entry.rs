//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A single resident value plus the bookkeeping the store needs.
///
/// Entries never leave the store; callers only ever see clones of `value`.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion instant, reset on overwrite
    pub inserted_at: Instant,
    /// Insertion sequence number, used to find the globally oldest entry
    pub seq: u64,
    /// Time-to-live measured from `inserted_at`
    pub ttl: Duration,
    /// Successful reads since insertion
    pub hits: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current instant.
    pub fn new(value: V, ttl: Duration, seq: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            seq,
            ttl,
            hits: 0,
        }
    }

    // == Age ==
    /// Time elapsed since insertion.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.inserted_at)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: the entry is still live when its age equals the
    /// TTL exactly; it only expires once the age is strictly greater.
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }
}
