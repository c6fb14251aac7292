//! Delayed Flush Timer
//!
//! A cancelable one-shot task with an atomic claim, so that a timer firing
//! and an explicit cancel can never both succeed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

// == Delayed Task ==
/// Runs a callback once after a delay unless canceled first.
///
/// The callback itself must call [`DelayedTask::claim`] (through whatever
/// owns the task) before acting; whoever claims first wins.
#[derive(Debug)]
pub(crate) struct DelayedTask {
    claimed: AtomicBool,
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Schedules `on_fire` to run after `delay` on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });

        Self {
            claimed: AtomicBool::new(false),
            handle,
        }
    }

    // == Claim ==
    /// Atomically takes the right to act. Returns `true` exactly once.
    pub fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // == Cancel ==
    /// Claims the task and stops its timer. Returns `false` if the task was
    /// already claimed, in which case nothing is aborted.
    pub fn cancel(&self) -> bool {
        let won = self.claim();
        if won {
            self.handle.abort();
        }
        won
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
