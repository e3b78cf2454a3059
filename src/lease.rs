//! Single-use ownership handle over one borrowed object

use crate::errors::PoolResult;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::warn;

/// A lease over exactly one borrowed object. Closing the lease (explicitly or
/// by drop) returns the object to its pool exactly once; the held reference
/// is taken out before the return callback runs, so a closed lease can never
/// expose the object again.
///
/// Return-path failures are logged and swallowed - the caller must not be
/// broken by a backing-store return error.
///
/// # Examples
///
/// ```
/// use poolside::{FnFactory, PoolConfig, build_pool};
///
/// let pool = build_pool("demo", PoolConfig::new(), Box::new(FnFactory::new(|| 42))).unwrap();
/// let lease = pool.borrow().unwrap();
/// assert_eq!(*lease, 42);
/// drop(lease); // object goes back to the pool
/// ```
pub struct Lease<T> {
    value: Option<T>,
    returner: Arc<dyn Fn(T) -> PoolResult<()> + Send + Sync>,
}

impl<T> Lease<T> {
    pub(crate) fn new(value: T, returner: Arc<dyn Fn(T) -> PoolResult<()> + Send + Sync>) -> Self {
        Self {
            value: Some(value),
            returner,
        }
    }

    /// Access the leased object.
    ///
    /// # Panics
    ///
    /// Panics if the lease was already closed.
    pub fn get(&self) -> &T {
        self.value.as_ref().expect("lease already closed")
    }

    /// Mutable access to the leased object.
    ///
    /// # Panics
    ///
    /// Panics if the lease was already closed.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("lease already closed")
    }

    /// Return the object to the pool. Idempotent: only the first call fires
    /// the return callback, later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(value) = self.value.take() {
            if let Err(err) = (self.returner)(value) {
                warn!(error = %err, "failed to return leased object to pool");
            }
        }
    }

    /// Whether the lease has been closed.
    pub fn is_closed(&self) -> bool {
        self.value.is_none()
    }
}

impl<T> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        self.close();
    }
}
