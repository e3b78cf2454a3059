//! Error types for the pooling layer

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by pools, backends, factories and the pool registry.
///
/// Borrow-path and registration failures propagate to the caller; return-path
/// and shutdown failures are recovered locally (logged, never rethrown).
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("pool exhausted - no object became available within {wait:?}")]
    Exhausted { wait: Duration },

    #[error("pool '{name}' is closed")]
    Closed { name: String },

    #[error("pool with name '{name}' already registered")]
    DuplicateRegistration { name: String },

    #[error("factory failed to {action}: {detail}")]
    FactoryAction { action: &'static str, detail: String },

    #[error("pool backend '{provider}' unavailable: {detail}")]
    BackendUnavailable { provider: String, detail: String },
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Errors from the lazy-init singleton holder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SingletonError {
    #[error("singleton already initialized and cannot be changed")]
    AlreadyInitialized,

    #[error("attempt to reinitialize singleton with the instance it already holds")]
    Reinitialized,
}
