//! Metrics snapshots for pools and the registry-wide collector

use crate::config::PoolConfig;
use crate::manager::PoolManager;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable snapshot of one pool's live counters plus its resolved
/// configuration. Always read from the live counters at call time.
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetrics {
    /// Objects currently borrowed from the pool.
    pub num_active: usize,

    /// Objects currently idle in the pool.
    pub num_idle: usize,

    /// Callers currently blocked waiting for an object.
    pub num_waiters: usize,

    /// Total objects borrowed over the pool's lifetime.
    pub borrowed_count: u64,

    /// Total objects returned over the pool's lifetime.
    pub returned_count: u64,

    /// Total objects created by the factory.
    pub created_count: u64,

    /// Total objects destroyed by the factory.
    pub destroyed_count: u64,

    /// The configuration the pool was built with.
    pub config: PoolConfig,
}

/// Live counters reported by a backing adapter. Borrowed/returned totals are
/// tracked by the pool itself; created/destroyed come from the counting
/// factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendCounters {
    pub num_active: usize,
    pub num_idle: usize,
    pub num_waiters: usize,
    pub created: u64,
    pub destroyed: u64,
}

/// Collects metrics from every pool registered with a [`PoolManager`],
/// keyed by pool name. This is the read-only introspection surface for
/// external monitoring.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use poolside::{MetricsCollector, PoolManager};
///
/// let manager = Arc::new(PoolManager::new());
/// let collector = MetricsCollector::new(Arc::clone(&manager));
/// assert!(collector.snapshot().is_empty());
/// ```
pub struct MetricsCollector {
    manager: Arc<PoolManager>,
}

impl MetricsCollector {
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self { manager }
    }

    /// Snapshot every registered pool's metrics. Never fails.
    pub fn snapshot(&self) -> HashMap<String, PoolMetrics> {
        let mut out = HashMap::with_capacity(self.manager.size());
        self.manager.each(|name, pool| {
            out.insert(name.to_string(), pool.metrics());
        });
        out
    }
}
