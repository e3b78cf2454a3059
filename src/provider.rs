//! Closed registry of backing adapters, resolved by provider key

use crate::bounded::BoundedBackend;
use crate::cached::CachedBackend;
use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::{CountingFactory, PoolObjectFactory};
use crate::pool::Pool;

use std::sync::Arc;

/// The backing adapters available to build pools with. This is a closed set:
/// an unknown key fails fast with
/// [`PoolError::BackendUnavailable`] instead of silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Bounded store with a blocking wait policy and idle eviction.
    Bounded,
    /// Unbounded, non-blocking store that caches idle objects.
    Cached,
}

impl Provider {
    pub const BOUNDED_KEY: &'static str = "bounded";
    pub const CACHED_KEY: &'static str = "cached";

    /// Resolve a provider from its configuration key. An absent key selects
    /// the default ([`Provider::Bounded`]).
    pub fn from_key(key: Option<&str>) -> PoolResult<Self> {
        match key {
            None => Ok(Self::Bounded),
            Some(Self::BOUNDED_KEY) => Ok(Self::Bounded),
            Some(Self::CACHED_KEY) => Ok(Self::Cached),
            Some(other) => Err(PoolError::BackendUnavailable {
                provider: other.to_string(),
                detail: "unknown provider key".to_string(),
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Bounded => Self::BOUNDED_KEY,
            Self::Cached => Self::CACHED_KEY,
        }
    }
}

/// Build a pool for `factory` using the provider selected by
/// `config.provider`. Missing configuration fields are filled from the
/// built-in defaults before the backend sees them.
///
/// # Examples
///
/// ```
/// use poolside::{FnFactory, PoolConfig, build_pool};
///
/// let pool = build_pool(
///     "parsers",
///     PoolConfig::new().with_provider("cached"),
///     Box::new(FnFactory::new(String::new)),
/// )
/// .unwrap();
/// assert_eq!(pool.name(), "parsers");
/// ```
pub fn build_pool<T: Send + 'static>(
    name: &str,
    mut config: PoolConfig,
    factory: Box<dyn PoolObjectFactory<T>>,
) -> PoolResult<Pool<T>> {
    let provider = Provider::from_key(config.provider.as_deref())?;
    config.apply_defaults(&PoolConfig::builtin_defaults());
    let factory = Arc::new(CountingFactory::new(factory));

    let backend: Box<dyn crate::backend::PoolBackend<T>> = match provider {
        Provider::Bounded => Box::new(BoundedBackend::new(name, &config, factory)?),
        Provider::Cached => Box::new(CachedBackend::new(name, &config, factory)),
    };
    Ok(Pool::new(name, config, backend))
}
