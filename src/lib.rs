//! # poolside
//!
//! Backend-agnostic object pooling: borrow and return expensive-to-create or
//! limited resources (parsers, connections, buffers) through one uniform
//! contract while the allocation strategy stays swappable behind an adapter.
//!
//! ## Features
//!
//! - Single-use [`Lease`] handles with exactly-once, idempotent return
//! - Swappable backing adapters behind one [`Pool`] contract
//!   (bounded store with blocking waits and eviction, or an unbounded
//!   non-blocking cache)
//! - Process-wide [`PoolManager`] registry with unique naming and ordered
//!   shutdown
//! - Per-pool configuration with a `"default"`-entry inheritance chain
//! - Live [`PoolMetrics`] snapshots keyed by pool name
//! - [`LazyInitSingleton`] for exactly-once default instances with
//!   pre-registration
//!
//! ## Quick Start
//!
//! ```rust
//! use poolside::{FnFactory, PoolConfig, build_pool};
//!
//! let pool = build_pool(
//!     "buffers",
//!     PoolConfig::new().with_max_total(4),
//!     Box::new(FnFactory::new(|| Vec::<u8>::with_capacity(1024))),
//! )
//! .unwrap();
//!
//! {
//!     let lease = pool.borrow().unwrap();
//!     assert!(lease.capacity() >= 1024);
//!     // the buffer goes back to the pool when `lease` drops
//! }
//! assert_eq!(pool.metrics().num_active, 0);
//! ```

mod backend;
mod bounded;
mod cached;
mod config;
mod errors;
mod factory;
mod lease;
mod manager;
mod metrics;
mod pool;
mod provider;
mod singleton;

pub use backend::PoolBackend;
pub use config::{PoolConfig, PoolConfigMap};
pub use errors::{PoolError, PoolResult, SingletonError};
pub use factory::{CountingFactory, FactoryError, FnFactory, PoolObjectFactory};
pub use lease::Lease;
pub use manager::{PoolManager, default_manager, pool_name_for_factory, to_kebab_case};
pub use metrics::{BackendCounters, MetricsCollector, PoolMetrics};
pub use pool::{ManagedPool, Pool};
pub use provider::{Provider, build_pool};
pub use singleton::LazyInitSingleton;
