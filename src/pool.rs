//! The pool contract and the common lease-issuing state machine

use crate::backend::PoolBackend;
use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::lease::Lease;
use crate::metrics::PoolMetrics;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Type-erased lifecycle view of a pool, used by the registry. Closed-state
/// and metrics queries never fail.
pub trait ManagedPool: Send + Sync {
    fn name(&self) -> &str;
    fn metrics(&self) -> PoolMetrics;
    /// Idempotent; never blocks on outstanding leases and never fails
    /// visibly.
    fn close(&self);
    fn is_closed(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

struct PoolInner<T> {
    name: String,
    config: PoolConfig,
    backend: Box<dyn PoolBackend<T>>,
    closed: AtomicBool,
    borrowed: AtomicU64,
    returned: AtomicU64,
}

/// A pool of reusable objects behind one of the backing adapters.
///
/// `Pool` is a cheap handle (clones share the same pool) issuing single-use
/// [`Lease`]s. The common state machine lives here: the monotonic closed
/// flag, the borrowed/returned counters and the lease return path are
/// identical for every backend; backends only supply
/// acquire/release/shutdown.
///
/// # Examples
///
/// ```
/// use poolside::{FnFactory, PoolConfig, build_pool};
///
/// let pool = build_pool(
///     "buffers",
///     PoolConfig::new().with_max_total(2),
///     Box::new(FnFactory::new(|| Vec::<u8>::with_capacity(1024))),
/// )
/// .unwrap();
///
/// let total = pool.with(|buf| {
///     buf.extend_from_slice(b"abc");
///     buf.len()
/// })
/// .unwrap();
/// assert_eq!(total, 3);
/// assert_eq!(pool.metrics().num_active, 0);
/// ```
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Pool<T> {
    pub(crate) fn new(name: &str, config: PoolConfig, backend: Box<dyn PoolBackend<T>>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.to_string(),
                config,
                backend,
                closed: AtomicBool::new(false),
                borrowed: AtomicU64::new(0),
                returned: AtomicU64::new(0),
            }),
        }
    }

    /// Borrow one object, wrapped in a single-use [`Lease`].
    ///
    /// Fails with [`PoolError::Closed`] once the pool is closed and with
    /// [`PoolError::Exhausted`] when the backend cannot supply an object
    /// within its wait policy.
    pub fn borrow(&self) -> PoolResult<Lease<T>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed {
                name: self.inner.name.clone(),
            });
        }
        let object = self.inner.backend.acquire()?;
        self.inner.borrowed.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        Ok(Lease::new(
            object,
            Arc::new(move |object| {
                inner.returned.fetch_add(1, Ordering::Relaxed);
                inner.backend.release(object)
            }),
        ))
    }

    /// Borrow an object, run `f` on it and return it to the pool on every
    /// exit path, including a panic in `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> PoolResult<R> {
        let mut lease = self.borrow()?;
        Ok(f(lease.get_mut()))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Live snapshot of the pool's counters; never cached, never fails.
    pub fn metrics(&self) -> PoolMetrics {
        let counters = self.inner.backend.counters();
        PoolMetrics {
            num_active: counters.num_active,
            num_idle: counters.num_idle,
            num_waiters: counters.num_waiters,
            borrowed_count: self.inner.borrowed.load(Ordering::Relaxed),
            returned_count: self.inner.returned.load(Ordering::Relaxed),
            created_count: counters.created,
            destroyed_count: counters.destroyed,
            config: self.inner.config.clone(),
        }
    }

    /// Stop new borrows and tear down the backend. First caller wins;
    /// subsequent calls are no-ops. Outstanding leases stay individually
    /// valid and their return path tolerates the teardown. Shutdown failures
    /// are logged, never rethrown.
    pub fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        debug!(pool = %self.inner.name, "closing pool");
        if let Err(err) = self.inner.backend.shutdown() {
            warn!(pool = %self.inner.name, error = %err, "failed to close pool");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> ManagedPool for Pool<T> {
    fn name(&self) -> &str {
        Pool::name(self)
    }

    fn metrics(&self) -> PoolMetrics {
        Pool::metrics(self)
    }

    fn close(&self) {
        Pool::close(self)
    }

    fn is_closed(&self) -> bool {
        Pool::is_closed(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
