//! Batch Module
//!
//! Coalesces concurrent calls that share a batch key into a single
//! processor invocation, flushed by size or timeout.

mod batcher;
mod group;
mod processor;
mod stats;
mod timer;

pub use batcher::{BatchConfig, Batcher, Pending};
pub use processor::{Processor, ProcessorFuture};
pub use stats::BatcherStats;
