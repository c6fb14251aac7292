//! Insertion Order Module
//!
//! Tracks the insertion sequence of resident keys so the globally oldest
//! entry can be found without scanning the store.

use std::collections::BTreeMap;

// == Insertion Order ==
/// Maps insertion sequence numbers to keys.
///
/// Reads never reorder keys. Only a fresh insertion (or overwrite) moves a
/// key to the young end.
#[derive(Debug, Default)]
pub(crate) struct InsertionOrder {
    by_seq: BTreeMap<u64, String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            by_seq: BTreeMap::new(),
        }
    }

    // == Record ==
    /// Registers `key` under a new sequence number.
    ///
    /// The caller must `forget` any previous sequence for the same key.
    pub fn record(&mut self, seq: u64, key: &str) {
        self.by_seq.insert(seq, key.to_string());
    }

    // == Forget ==
    /// Drops the sequence number of a removed or overwritten entry.
    pub fn forget(&mut self, seq: u64) {
        self.by_seq.remove(&seq);
    }

    // == Pop Oldest ==
    /// Returns and removes the key with the smallest sequence number.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.by_seq.pop_first().map(|(_, key)| key)
    }

    // == Peek Oldest ==
    #[cfg(test)]
    pub fn peek_oldest(&self) -> Option<&String> {
        self.by_seq.values().next()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.by_seq.clear();
    }
}
