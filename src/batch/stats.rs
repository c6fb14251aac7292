//! Batcher Statistics Module

use std::collections::BTreeMap;

use serde::Serialize;

// == Batcher Stats ==
/// Point-in-time view of a batcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    /// Groups waiting for a flush
    pub active_groups: usize,
    /// Waiters across all open groups
    pub pending_waiters: usize,
    /// Waiters per open group, by batch key
    pub per_group: BTreeMap<String, usize>,
    /// Lifetime flushes triggered by reaching the batch size
    pub size_flushes: u64,
    /// Lifetime flushes triggered by the timeout
    pub timer_flushes: u64,
}
