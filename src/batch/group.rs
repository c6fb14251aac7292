//! Batch Group Module
//!
//! A group of waiters sharing one batch key, and the delivery of a flushed
//! group's results back to them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::batch::processor::{Processor, ProcessorFuture};
use crate::batch::timer::DelayedTask;
use crate::error::BatchError;

pub(crate) type Reply<R, E> = oneshot::Sender<Result<R, BatchError<E>>>;

// == Flush Trigger ==
/// Which condition detached a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushTrigger {
    Size,
    Timer,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Size => f.write_str("size"),
            FlushTrigger::Timer => f.write_str("timer"),
        }
    }
}

// == Waiter ==
/// One pending request inside a group.
pub(crate) struct Waiter<P, R, E> {
    pub id: u64,
    pub payload: P,
    pub reply: Reply<R, E>,
    pub enqueued_at: Instant,
}

// == Batch Group ==
pub(crate) struct BatchGroup<P, R, E> {
    /// Distinguishes this group from later groups under the same key
    pub id: u64,
    waiters: Vec<Waiter<P, R, E>>,
    processor: Arc<dyn Processor<P, R, E>>,
    timer: DelayedTask,
}

impl<P, R, E> BatchGroup<P, R, E> {
    pub fn new(id: u64, processor: Arc<dyn Processor<P, R, E>>, timer: DelayedTask) -> Self {
        Self {
            id,
            waiters: Vec::new(),
            processor,
            timer,
        }
    }

    pub fn push(&mut self, id: u64, payload: P, reply: Reply<R, E>) {
        self.waiters.push(Waiter {
            id,
            payload,
            reply,
            enqueued_at: Instant::now(),
        });
    }

    /// Removes a still-pending waiter. Leaves the timer untouched.
    pub fn withdraw(&mut self, waiter_id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == waiter_id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Claim on behalf of the size trigger; stops the timer on success.
    pub fn claim_for_size(&self) -> bool {
        self.timer.cancel()
    }

    /// Claim on behalf of the timer that is currently firing.
    pub fn claim_for_timer(&self) -> bool {
        self.timer.claim()
    }

    // == Flush ==
    /// Hands the detached group to its processor.
    ///
    /// The processor is invoked synchronously with the payloads in submission
    /// order; its future is driven on a spawned task so delivery does not
    /// depend on any single waiter staying alive.
    pub fn flush(self, key: &str, trigger: FlushTrigger)
    where
        P: Send + 'static,
        R: Send + 'static,
        E: Send + Sync + 'static,
    {
        debug_assert!(self.timer.is_claimed());

        if self.waiters.is_empty() {
            debug!(key, %trigger, "batch group emptied by withdrawals, skipping processor");
            return;
        }

        let oldest_wait = self
            .waiters
            .first()
            .map(|w| w.enqueued_at.elapsed())
            .unwrap_or_default();
        debug!(
            key,
            %trigger,
            size = self.waiters.len(),
            oldest_wait_ms = oldest_wait.as_millis() as u64,
            "flushing batch group"
        );

        let (payloads, replies): (Vec<P>, Vec<Reply<R, E>>) = self
            .waiters
            .into_iter()
            .map(|w| (w.payload, w.reply))
            .unzip();

        let pending = self.processor.process(payloads);
        tokio::spawn(deliver(pending, replies));
    }
}

// == Deliver ==
/// Distributes results by position, or the shared error to everyone.
async fn deliver<R, E>(pending: ProcessorFuture<R, E>, replies: Vec<Reply<R, E>>) {
    match pending.await {
        Ok(results) => {
            let returned = results.len();
            let mut results = results.into_iter();
            for (index, reply) in replies.into_iter().enumerate() {
                let outcome = results
                    .next()
                    .ok_or(BatchError::MissingResult { index, returned });
                // The waiter may have been dropped after the flush
                let _ = reply.send(outcome);
            }
        }
        Err(err) => {
            let err = Arc::new(err);
            for reply in replies {
                let _ = reply.send(Err(BatchError::Processor(Arc::clone(&err))));
            }
        }
    }
}
