//! The adapter boundary between the pool contract and a backing store

use crate::errors::PoolResult;
use crate::metrics::BackendCounters;

/// Acquire/release/shutdown hooks supplied by one concrete backing store.
///
/// The pool layered on top owns all lease bookkeeping and closed-state
/// enforcement; a backend only translates these hooks onto its own
/// algorithm and reports its live counters. Backends must translate their
/// internal failures into [`PoolError`](crate::PoolError) - callers never
/// see backend-specific error types.
pub trait PoolBackend<T>: Send + Sync {
    /// Hand out one object, honoring the backend's wait policy.
    fn acquire(&self) -> PoolResult<T>;

    /// Take one object back. Must tolerate being called after
    /// [`shutdown`](Self::shutdown) has begun.
    fn release(&self, object: T) -> PoolResult<()>;

    /// Tear the backing store down. Idempotent.
    fn shutdown(&self) -> PoolResult<()>;

    /// Live counters, read at call time.
    fn counters(&self) -> BackendCounters;
}
