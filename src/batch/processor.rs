//! Batch Processor Contract
//!
//! The caller-supplied function that performs the real upstream call for a
//! whole group of payloads.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by a [`Processor`].
pub type ProcessorFuture<R, E> = Pin<Box<dyn Future<Output = Result<Vec<R>, E>> + Send>>;

// == Processor ==
/// Turns an ordered list of payloads into an ordered list of results.
///
/// Result `i` belongs to payload `i`. A failure applies to the whole group.
/// Implemented for any `Fn(Vec<P>) -> impl Future<Output = Result<Vec<R>, E>>`.
pub trait Processor<P, R, E>: Send + Sync + 'static {
    fn process(&self, payloads: Vec<P>) -> ProcessorFuture<R, E>;
}

impl<P, R, E, F, Fut> Processor<P, R, E> for F
where
    F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, E>> + Send + 'static,
{
    fn process(&self, payloads: Vec<P>) -> ProcessorFuture<R, E> {
        Box::pin(self(payloads))
    }
}
