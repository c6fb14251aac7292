//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with insertion-order tracking
//! and lazy TTL expiration.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, trace};

use crate::cache::entry::CacheEntry;
use crate::cache::order::InsertionOrder;
use crate::cache::stats::{CacheCounters, CacheStats};

// == Cache Store ==
/// Bounded key-value storage with per-entry TTL.
///
/// When full, the store evicts the entry with the oldest insertion time,
/// regardless of how often it was read or how much TTL it has left.
/// Expiry is checked lazily on access; nothing sweeps in the background.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order of resident keys
    order: InsertionOrder,
    /// Lifetime counters
    counters: CacheCounters,
    /// Next insertion sequence number
    next_seq: u64,
    /// Maximum number of entries allowed
    max_size: usize,
    /// TTL for entries stored without an explicit one
    default_ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            counters: CacheCounters::default(),
            next_seq: 0,
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    // == Put ==
    /// Stores a value under `key` with the default TTL.
    pub fn put(&mut self, key: String, value: V) {
        let ttl = self.default_ttl;
        self.put_with_ttl(key, value, ttl);
    }

    /// Stores a value under `key` with an explicit TTL.
    ///
    /// Overwriting resets the insertion time, TTL and hit count. Inserting a
    /// new key into a full store evicts the oldest entry first.
    pub fn put_with_ttl(&mut self, key: String, value: V, ttl: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(previous) = self.entries.get(&key) {
            self.order.forget(previous.seq);
        } else if self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        self.order.record(seq, &key);
        self.entries.insert(key, CacheEntry::new(value, ttl, seq));
        debug_assert_eq!(self.order.len(), self.entries.len());
    }

    // == Get ==
    /// Retrieves a clone of the value stored under `key`.
    ///
    /// Expired entries are purged and reported as a miss. Only a successful
    /// read bumps the entry's hit counter.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_miss();
            trace!(key, "purged expired cache entry");
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.hits += 1;
        self.counters.record_hit();
        Some(entry.value.clone())
    }

    // == Has ==
    /// Same as `get(key).is_some()`, hit accounting included.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether something was resident.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes every entry. Lifetime counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    // == Stats ==
    /// Returns a snapshot of the store.
    ///
    /// `total_hits` and `average_age` cover every resident entry, including
    /// ones that would read as expired.
    pub fn stats(&self) -> CacheStats {
        let size = self.entries.len();
        let total_hits = self.entries.values().map(|e| e.hits).sum();
        let average_age = if size == 0 {
            Duration::ZERO
        } else {
            let total: Duration = self.entries.values().map(|e| e.age()).sum();
            total / size as u32
        };

        CacheStats {
            size,
            max_size: self.max_size,
            total_hits,
            average_age,
            hits: self.counters.hits,
            misses: self.counters.misses,
            evictions: self.counters.evictions,
        }
    }

    // == Length ==
    /// Returns the current number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.forget(entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.order.pop_oldest() {
            self.entries.remove(&evicted);
            self.counters.record_eviction();
            debug!(key = %evicted, "evicted oldest cache entry");
        }
    }
}
