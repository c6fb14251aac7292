//! Shared Cache Handle
//!
//! Thread-safe wrapper around [`CacheStore`] for process-wide instances.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cache::{CacheStats, CacheStore};

// == TTL Cache ==
/// Cloneable handle to a mutex-guarded [`CacheStore`].
///
/// Clones share storage. Every operation is a short synchronous critical
/// section, so callers on async tasks can use it without awaiting.
#[derive(Debug)]
pub struct TtlCache<V> {
    store: Arc<Mutex<CacheStore<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache with the given capacity and default TTL.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(max_size, default_ttl))),
        }
    }

    // Poisoning is ignored: no store operation leaves it half-updated.
    fn lock(&self) -> MutexGuard<'_, CacheStore<V>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.lock().put(key.into(), value);
    }

    pub fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.lock().put_with_ttl(key.into(), value, ttl);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().has(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().delete(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.lock().max_size()
    }

    pub fn default_ttl(&self) -> Duration {
        self.lock().default_ttl()
    }
}
