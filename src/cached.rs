//! Unbounded, non-blocking backing store (the soft-reference analog)

use crate::backend::PoolBackend;
use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::SharedFactory;
use crate::metrics::BackendCounters;

use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// Backing store with no bounded capacity and no wait semantics: a borrow
/// either reuses an idle object or creates a fresh one, and never blocks.
/// `num_waiters` is always zero because this store cannot express waiting.
/// Created/destroyed counts come from the counting factory - the store keeps
/// no lifecycle bookkeeping of its own.
///
/// There is no garbage collector to shrink the idle set under memory
/// pressure, so returns past `max_idle` are destroyed instead of cached.
pub(crate) struct CachedBackend<T> {
    name: String,
    factory: SharedFactory<T>,
    idle: SegQueue<T>,
    num_active: AtomicUsize,
    max_idle: usize,
    test_on_borrow: bool,
    test_on_return: bool,
    closed: AtomicBool,
}

impl<T: Send> CachedBackend<T> {
    pub(crate) fn new(name: &str, config: &PoolConfig, factory: SharedFactory<T>) -> Self {
        Self {
            name: name.to_string(),
            factory,
            idle: SegQueue::new(),
            num_active: AtomicUsize::new(0),
            max_idle: config.max_idle.unwrap_or(usize::MAX),
            test_on_borrow: config.test_on_borrow.unwrap_or(true),
            test_on_return: config.test_on_return.unwrap_or(false),
            closed: AtomicBool::new(false),
        }
    }

    fn discard(&self, object: T) {
        if let Err(err) = self.factory.destroy(object) {
            debug!(pool = %self.name, error = %err, "failed to destroy discarded object");
        }
    }
}

impl<T: Send> PoolBackend<T> for CachedBackend<T> {
    fn acquire(&self) -> PoolResult<T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed {
                name: self.name.clone(),
            });
        }

        while let Some(object) = self.idle.pop() {
            if self.test_on_borrow && !self.factory.validate(&object) {
                self.discard(object);
                continue;
            }
            self.num_active.fetch_add(1, Ordering::Relaxed);
            return Ok(object);
        }

        let object = self.factory.create()?;
        self.num_active.fetch_add(1, Ordering::Relaxed);
        Ok(object)
    }

    fn release(&self, mut object: T) -> PoolResult<()> {
        self.num_active.fetch_sub(1, Ordering::Relaxed);

        if let Err(err) = self.factory.reset(&mut object) {
            self.discard(object);
            return Err(err);
        }
        if self.test_on_return && !self.factory.validate(&object) {
            self.discard(object);
            return Ok(());
        }
        if self.closed.load(Ordering::Acquire) || self.idle.len() >= self.max_idle {
            self.discard(object);
            return Ok(());
        }
        self.idle.push(object);
        Ok(())
    }

    fn shutdown(&self) -> PoolResult<()> {
        self.closed.store(true, Ordering::Release);
        while let Some(object) = self.idle.pop() {
            self.discard(object);
        }
        Ok(())
    }

    fn counters(&self) -> BackendCounters {
        BackendCounters {
            num_active: self.num_active.load(Ordering::Relaxed),
            num_idle: self.idle.len(),
            num_waiters: 0,
            created: self.factory.created_count(),
            destroyed: self.factory.destroyed_count(),
        }
    }
}
