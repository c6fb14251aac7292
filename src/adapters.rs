//! Memoization and Coalescing Adapters
//!
//! Higher-order wrappers that thread a plain async function through a
//! [`TtlCache`] or a [`Batcher`]. Each returns a function of the same shape
//! as its input, so they compose in either order.

use std::future::{self, Future};
use std::pin::Pin;
use std::time::Duration;

use crate::batch::{Batcher, Processor};
use crate::cache::TtlCache;
use crate::error::BatchError;

/// Boxed, sendable future returned by the wrapped functions.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// == With Cache ==
/// Memoizes `f` in `cache` under the key computed by `key_fn`.
///
/// A hit returns the cached value without calling `f`. A miss calls `f`,
/// stores a successful result (with `ttl` if given, the cache's default
/// otherwise) and returns it. Errors are passed through and never cached.
pub fn with_cache<A, V, E, F, Fut, K>(
    cache: TtlCache<V>,
    key_fn: K,
    ttl: Option<Duration>,
    f: F,
) -> impl Fn(A) -> BoxFuture<Result<V, E>> + Clone
where
    V: Clone + Send + 'static,
    E: Send + 'static,
    F: Fn(A) -> Fut + Clone,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    K: Fn(&A) -> String + Clone,
{
    move |args: A| -> BoxFuture<Result<V, E>> {
        let key = key_fn(&args);
        if let Some(hit) = cache.get(&key) {
            return Box::pin(future::ready(Ok(hit)));
        }

        let call = f(args);
        let cache = cache.clone();
        Box::pin(async move {
            let value = call.await?;
            match ttl {
                Some(ttl) => cache.put_with_ttl(key, value.clone(), ttl),
                None => cache.put(key, value.clone()),
            }
            Ok(value)
        })
    }
}

// == With Batching ==
/// Routes every call through `batcher.submit`, grouped by `key_fn`.
///
/// The submit happens when the wrapped function is called, not when the
/// returned future is first polled. Dropping the future withdraws the call.
pub fn with_batching<A, R, E, K, Pr>(
    batcher: Batcher<A, R, E>,
    key_fn: K,
    processor: Pr,
) -> impl Fn(A) -> BoxFuture<Result<R, BatchError<E>>> + Clone
where
    A: Send + 'static,
    R: Send + 'static,
    E: Send + Sync + 'static,
    K: Fn(&A) -> String + Clone,
    Pr: Processor<A, R, E> + Clone,
{
    move |args: A| -> BoxFuture<Result<R, BatchError<E>>> {
        let key = key_fn(&args);
        Box::pin(batcher.submit(key, args, processor.clone()))
    }
}
