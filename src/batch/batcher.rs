//! Batcher Module
//!
//! Groups concurrent submissions by batch key and flushes each group exactly
//! once, either when it reaches `batch_size` or when its timer fires.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::batch::group::{BatchGroup, FlushTrigger};
use crate::batch::processor::Processor;
use crate::batch::stats::BatcherStats;
use crate::batch::timer::DelayedTask;
use crate::error::BatchError;

// == Batch Config ==
/// Flush thresholds shared by every group of a batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Group size that triggers an immediate flush (at least 1)
    pub batch_size: usize,
    /// Delay after group creation before a partial flush
    pub batch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_timeout: Duration::from_millis(1000),
        }
    }
}

// == Batcher ==
/// Coalesces concurrent calls sharing a batch key into one processor call.
///
/// Cloning yields another handle to the same groups. Groups under different
/// keys never share a timer or a flush.
pub struct Batcher<P, R, E> {
    inner: Arc<Inner<P, R, E>>,
}

struct Inner<P, R, E> {
    config: BatchConfig,
    groups: Mutex<HashMap<String, BatchGroup<P, R, E>>>,
    next_id: AtomicU64,
    size_flushes: AtomicU64,
    timer_flushes: AtomicU64,
}

impl<P, R, E> Clone for Batcher<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R, E> std::fmt::Debug for Batcher<P, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<P, R, E> Batcher<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(config: BatchConfig) -> Self {
        let config = BatchConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };

        Self {
            inner: Arc::new(Inner {
                config,
                groups: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                size_flushes: AtomicU64::new(0),
                timer_flushes: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> BatchConfig {
        self.inner.config
    }

    // == Submit ==
    /// Adds `payload` to the group for `key` and returns a future for its
    /// result.
    ///
    /// The first submit for a fresh key creates the group, starts its timer
    /// and fixes `processor` as the one the group will use. If this submit
    /// fills the group, the processor is invoked before `submit` returns.
    /// Dropping the returned [`Pending`] before it resolves withdraws the
    /// payload from its group.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn submit<F>(&self, key: impl Into<String>, payload: P, processor: F) -> Pending<P, R, E>
    where
        F: Processor<P, R, E>,
    {
        let key = key.into();
        let inner = &self.inner;
        let (reply, receiver) = oneshot::channel();
        let waiter_id = inner.next_id.fetch_add(1, Ordering::Relaxed);

        let (group_id, detached) = {
            let mut groups = inner.lock_groups();
            let group = match groups.entry(key.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let group_id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let timer = self.start_timer(key.clone(), group_id);
                    trace!(key = %key, group_id, "opened batch group");
                    slot.insert(BatchGroup::new(group_id, Arc::new(processor), timer))
                }
            };

            group.push(waiter_id, payload, reply);
            let group_id = group.id;

            let full = group.len() >= inner.config.batch_size;
            let detached = if full && group.claim_for_size() {
                groups.remove(&key)
            } else {
                None
            };
            (group_id, detached)
        };

        if let Some(group) = detached {
            inner.size_flushes.fetch_add(1, Ordering::Relaxed);
            group.flush(&key, FlushTrigger::Size);
        }

        Pending {
            batcher: Arc::downgrade(&self.inner),
            key,
            group_id,
            waiter_id,
            receiver,
            settled: false,
        }
    }

    fn start_timer(&self, key: String, group_id: u64) -> DelayedTask {
        let batcher = Arc::downgrade(&self.inner);
        DelayedTask::spawn(self.inner.config.batch_timeout, move || {
            if let Some(inner) = batcher.upgrade() {
                inner.flush_on_timer(&key, group_id);
            }
        })
    }

    // == Stats ==
    pub fn stats(&self) -> BatcherStats {
        let per_group: std::collections::BTreeMap<String, usize> = self
            .inner
            .lock_groups()
            .iter()
            .map(|(key, group)| (key.clone(), group.len()))
            .collect();

        BatcherStats {
            active_groups: per_group.len(),
            pending_waiters: per_group.values().sum(),
            per_group,
            size_flushes: self.inner.size_flushes.load(Ordering::Relaxed),
            timer_flushes: self.inner.timer_flushes.load(Ordering::Relaxed),
        }
    }
}

impl<P, R, E> Inner<P, R, E> {
    // Poisoning is ignored: no critical section leaves the map half-updated.
    fn lock_groups(&self) -> MutexGuard<'_, HashMap<String, BatchGroup<P, R, E>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn withdraw(&self, key: &str, group_id: u64, waiter_id: u64) -> bool {
        let mut groups = self.lock_groups();
        let withdrawn = groups
            .get_mut(key)
            .filter(|group| group.id == group_id)
            .is_some_and(|group| group.withdraw(waiter_id));

        if withdrawn {
            debug!(key, group_id, "withdrew waiter from batch group");
        }
        withdrawn
    }
}

impl<P, R, E> Inner<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Send + Sync + 'static,
{
    fn flush_on_timer(&self, key: &str, group_id: u64) {
        let detached = {
            let mut groups = self.lock_groups();
            let claimed = groups
                .get(key)
                .is_some_and(|group| group.id == group_id && group.claim_for_timer());
            if claimed {
                groups.remove(key)
            } else {
                None
            }
        };

        if let Some(group) = detached {
            self.timer_flushes.fetch_add(1, Ordering::Relaxed);
            group.flush(key, FlushTrigger::Timer);
        }
    }
}

// == Pending ==
/// The eventual result of one [`Batcher::submit`] call.
///
/// Resolves once the group is flushed and the processor finishes.
#[must_use = "dropping a Pending withdraws its payload from the batch"]
pub struct Pending<P, R, E> {
    batcher: Weak<Inner<P, R, E>>,
    key: String,
    group_id: u64,
    waiter_id: u64,
    receiver: oneshot::Receiver<Result<R, BatchError<E>>>,
    settled: bool,
}

impl<P, R, E> Pending<P, R, E> {
    /// The batch key this payload was submitted under.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Cancel ==
    /// Withdraws the payload if its group has not flushed yet.
    ///
    /// Returns `true` when the waiter was removed. Siblings and the group's
    /// timer are unaffected.
    pub fn cancel(mut self) -> bool {
        self.withdraw()
    }

    fn withdraw(&mut self) -> bool {
        if self.settled {
            return false;
        }
        self.settled = true;

        match self.batcher.upgrade() {
            Some(inner) => inner.withdraw(&self.key, self.group_id, self.waiter_id),
            None => false,
        }
    }
}

impl<P, R, E> Future for Pending<P, R, E> {
    type Output = Result<R, BatchError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(Pin::new(&mut this.receiver).poll(cx));
        this.settled = true;
        Poll::Ready(outcome.unwrap_or(Err(BatchError::Abandoned)))
    }
}

impl<P, R, E> Drop for Pending<P, R, E> {
    fn drop(&mut self) {
        self.withdraw();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{advance, Instant};
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Debug, thiserror::Error)]
    #[error("upstream unavailable")]
    struct UpstreamDown;

    type Calls = Arc<Mutex<Vec<Vec<u32>>>>;

    /// Records every invocation and multiplies each payload by ten.
    fn recording(calls: &Calls) -> impl Processor<u32, u32, UpstreamDown> + Clone {
        let calls = Arc::clone(calls);
        move |payloads: Vec<u32>| {
            calls.lock().unwrap().push(payloads.clone());
            async move { Ok::<Vec<u32>, UpstreamDown>(payloads.into_iter().map(|p| p * 10).collect()) }
        }
    }

    fn batcher(batch_size: usize, timeout_ms: u64) -> Batcher<u32, u32, UpstreamDown> {
        Batcher::new(BatchConfig {
            batch_size,
            batch_timeout: Duration::from_millis(timeout_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_flushes_synchronously_in_order() {
        let calls = Calls::default();
        let batcher = batcher(3, 1000);

        let p1 = batcher.submit("k", 1, recording(&calls));
        let p2 = batcher.submit("k", 2, recording(&calls));
        assert!(calls.lock().unwrap().is_empty());

        advance(Duration::from_millis(10)).await;
        let p3 = batcher.submit("k", 3, recording(&calls));

        // Invoked inside the third submit, long before the timeout
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(batcher.stats().active_groups, 0);

        assert_eq!(p1.await.unwrap(), 10);
        assert_eq!(p2.await.unwrap(), 20);
        assert_eq!(p3.await.unwrap(), 30);
        assert_eq!(batcher.stats().size_flushes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_flushes_partial_group_once() {
        let calls = Calls::default();
        let batcher = batcher(3, 500);
        let start = Instant::now();

        let result = batcher.submit("k", 1, recording(&calls)).await;

        assert_eq!(result.unwrap(), 10);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500) && waited < Duration::from_millis(510));
        assert_eq!(*calls.lock().unwrap(), vec![vec![1]]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(batcher.stats().timer_flushes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_flush() {
        let calls = Calls::default();
        let batcher = batcher(2, 1000);

        let mut first = task::spawn(batcher.submit("k", 1, recording(&calls)));
        assert_pending!(first.poll());

        let second = batcher.submit("k", 2, recording(&calls));
        assert_eq!(second.await.unwrap(), 20);
        // Both replies are sent by the same delivery
        assert_eq!(assert_ready!(first.poll()).unwrap(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_flush_next_group() {
        let calls = Calls::default();
        let batcher = batcher(2, 500);

        let a = batcher.submit("k", 1, recording(&calls));
        let b = batcher.submit("k", 2, recording(&calls));
        assert_eq!(calls.lock().unwrap().len(), 1);

        advance(Duration::from_millis(400)).await;
        let c = batcher.submit("k", 3, recording(&calls));

        // The first group's timer would have fired at 500ms
        advance(Duration::from_millis(200)).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(batcher.stats().pending_waiters, 1);

        assert_eq!(c.await.unwrap(), 30);
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2], vec![3]]);
        assert_eq!(a.await.unwrap(), 10);
        assert_eq!(b.await.unwrap(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processor_failure_rejects_whole_group() {
        let batcher: Batcher<u32, u32, UpstreamDown> = batcher(2, 1000);
        let failing = |_: Vec<u32>| async { Err::<Vec<u32>, _>(UpstreamDown) };

        let a = batcher.submit("k", 1, failing);
        let b = batcher.submit("k", 2, failing);

        let (a, b) = (a.await, b.await);
        match (a, b) {
            (Err(BatchError::Processor(ea)), Err(BatchError::Processor(eb))) => {
                assert!(Arc::ptr_eq(&ea, &eb));
            }
            other => panic!("expected shared processor error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_result_list_rejects_only_missing_positions() {
        let batcher = batcher(3, 1000);
        let short = |payloads: Vec<u32>| async move {
            Ok::<Vec<u32>, UpstreamDown>(payloads.into_iter().take(2).collect())
        };

        let p0 = batcher.submit("k", 1, short);
        let p1 = batcher.submit("k", 2, short);
        let p2 = batcher.submit("k", 3, short);

        assert_eq!(p0.await.unwrap(), 1);
        assert_eq!(p1.await.unwrap(), 2);
        assert!(matches!(
            p2.await,
            Err(BatchError::MissingResult { index: 2, returned: 2 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_never_share_a_group() {
        let calls = Calls::default();
        let batcher = batcher(2, 500);

        let a = batcher.submit("a", 1, recording(&calls));
        let b = batcher.submit("b", 2, recording(&calls));

        let stats = batcher.stats();
        assert_eq!(stats.active_groups, 2);
        assert_eq!(stats.per_group.get("a"), Some(&1));
        assert_eq!(stats.per_group.get("b"), Some(&1));

        assert_eq!(a.await.unwrap(), 10);
        assert_eq!(b.await.unwrap(), 20);

        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![vec![1], vec![2]]);
        assert_eq!(batcher.stats().timer_flushes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdrawn_waiter_leaves_siblings_alone() {
        let calls = Calls::default();
        let batcher = batcher(3, 1000);

        let p1 = batcher.submit("k", 1, recording(&calls));
        let p2 = batcher.submit("k", 2, recording(&calls));
        assert!(p2.cancel());
        assert_eq!(batcher.stats().pending_waiters, 1);

        let p3 = batcher.submit("k", 3, recording(&calls));
        // Two pending out of three, nothing flushed
        assert!(calls.lock().unwrap().is_empty());

        let p4 = batcher.submit("k", 4, recording(&calls));
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 3, 4]]);

        assert_eq!(p1.await.unwrap(), 10);
        assert_eq!(p3.await.unwrap(), 30);
        assert_eq!(p4.await.unwrap(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_pending_withdraws() {
        let calls = Calls::default();
        let batcher = batcher(3, 500);

        drop(batcher.submit("k", 1, recording(&calls)));
        let kept = batcher.submit("k", 2, recording(&calls));

        assert_eq!(kept.await.unwrap(), 20);
        assert_eq!(*calls.lock().unwrap(), vec![vec![2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fully_withdrawn_group_skips_processor() {
        let calls = Calls::default();
        let batcher = batcher(3, 500);

        let only = batcher.submit("k", 1, recording(&calls));
        assert!(only.cancel());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(batcher.stats().active_groups, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_flush_is_noop() {
        let calls = Calls::default();
        let batcher = batcher(1, 500);

        let p = batcher.submit("k", 1, recording(&calls));

        assert!(!p.cancel());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_batcher_abandons_waiters() {
        let calls = Calls::default();
        let batcher = batcher(3, 500);

        let p = batcher.submit("k", 1, recording(&calls));
        drop(batcher);

        assert!(matches!(p.await, Err(BatchError::Abandoned)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submitters_get_their_own_results() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let batcher = batcher(10, 50);

        let handles: Vec<_> = (0..50u32)
            .map(|n| {
                let batcher = batcher.clone();
                let invocations = Arc::clone(&invocations);
                tokio::spawn(async move {
                    let processor = move |payloads: Vec<u32>| {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<Vec<u32>, UpstreamDown>(payloads.into_iter().map(|p| p * 10).collect()) }
                    };
                    batcher.submit("shared", n, processor).await
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), n as u32 * 10);
        }

        let invocations = invocations.load(Ordering::SeqCst);
        assert!(invocations >= 5, "expected at least 5 flushes, got {}", invocations);
        let stats = batcher.stats();
        assert_eq!(stats.pending_waiters, 0);
        assert_eq!(
            stats.size_flushes + stats.timer_flushes,
            invocations as u64
        );
    }
}
