//! Object factory contract and the counting decorator

use crate::errors::{PoolError, PoolResult};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Any error a user factory may produce. Non-domain errors are translated
/// into [`PoolError::FactoryAction`] at the adapter boundary.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Creates, validates, resets and destroys the objects managed by a pool.
///
/// Implementors only have to supply [`create`](Self::create); the remaining
/// methods default to no-ops suitable for objects without teardown needs.
pub trait PoolObjectFactory<T>: Send + Sync {
    /// Create a new instance.
    fn create(&self) -> Result<T, FactoryError>;

    /// Destroy an instance, releasing any resources it holds.
    fn destroy(&self, object: T) -> Result<(), FactoryError> {
        drop(object);
        Ok(())
    }

    /// Reset an instance to a clean state when it is returned to the pool.
    fn reset(&self, object: &mut T) -> Result<(), FactoryError> {
        let _ = object;
        Ok(())
    }

    /// Check an instance before it is borrowed or kept idle.
    fn validate(&self, object: &T) -> bool {
        let _ = object;
        true
    }
}

/// Decorates a user factory with created/destroyed counting, debug logging
/// and uniform error translation. Counters increment on successful
/// create/destroy only, never on failed attempts.
pub struct CountingFactory<T> {
    delegate: Box<dyn PoolObjectFactory<T>>,
    created: AtomicU64,
    destroyed: AtomicU64,
    label: String,
}

impl<T> CountingFactory<T> {
    pub fn new(delegate: Box<dyn PoolObjectFactory<T>>) -> Self {
        let label = short_id(delegate.as_ref());
        Self {
            delegate,
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            label,
        }
    }

    pub fn create(&self) -> PoolResult<T> {
        let object = translate("create", self.delegate.create())?;
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(factory = %self.label, "created {}", short_id(&object));
        Ok(object)
    }

    pub fn destroy(&self, object: T) -> PoolResult<()> {
        let id = short_id(&object);
        translate("destroy", self.delegate.destroy(object))?;
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        debug!(factory = %self.label, "destroyed {id}");
        Ok(())
    }

    pub fn reset(&self, object: &mut T) -> PoolResult<()> {
        translate("reset", self.delegate.reset(object))?;
        debug!(factory = %self.label, "reset {}", short_id(object));
        Ok(())
    }

    pub fn validate(&self, object: &T) -> bool {
        let valid = self.delegate.validate(object);
        debug!(factory = %self.label, valid, "validated {}", short_id(object));
        valid
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }
}

/// Pass domain errors through unchanged; wrap everything else with the
/// failing action's name.
fn translate<R>(action: &'static str, result: Result<R, FactoryError>) -> PoolResult<R> {
    result.map_err(|err| match err.downcast::<PoolError>() {
        Ok(domain) => {
            warn!("pool error while trying to {action}: {domain}");
            *domain
        }
        Err(other) => {
            warn!("error while trying to {action}: {other}");
            PoolError::FactoryAction {
                action,
                detail: other.to_string(),
            }
        }
    })
}

/// Stable short identity label: unqualified type name plus address. Generic
/// arguments are dropped so their path segments cannot leak into the label.
fn short_id<V: ?Sized>(value: &V) -> String {
    let full = std::any::type_name::<V>();
    let base = full.split('<').next().unwrap_or(full);
    let type_name = base.rsplit("::").next().unwrap_or("?");
    format!("{type_name}@{:x}", value as *const V as *const () as usize)
}

/// A factory wrapping a closure, for pools of objects without lifecycle needs.
///
/// # Examples
///
/// ```
/// use poolside::FnFactory;
///
/// let factory = FnFactory::new(|| Vec::<u8>::with_capacity(1024));
/// ```
pub struct FnFactory<T, F: Fn() -> T + Send + Sync> {
    make: F,
}

impl<T, F: Fn() -> T + Send + Sync> FnFactory<T, F> {
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

impl<T, F: Fn() -> T + Send + Sync> PoolObjectFactory<T> for FnFactory<T, F> {
    fn create(&self) -> Result<T, FactoryError> {
        Ok((self.make)())
    }
}

pub(crate) type SharedFactory<T> = Arc<CountingFactory<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        fail: bool,
    }

    impl PoolObjectFactory<String> for Flaky {
        fn create(&self) -> Result<String, FactoryError> {
            if self.fail {
                Err("disk on fire".into())
            } else {
                Ok(String::from("ok"))
            }
        }

        fn destroy(&self, _object: String) -> Result<(), FactoryError> {
            if self.fail { Err("still on fire".into()) } else { Ok(()) }
        }
    }

    struct DomainFailing;

    impl PoolObjectFactory<String> for DomainFailing {
        fn create(&self) -> Result<String, FactoryError> {
            Err(Box::new(PoolError::Closed {
                name: "inner".into(),
            }))
        }
    }

    #[test]
    fn counts_successful_creates_and_destroys_only() {
        let factory = CountingFactory::new(Box::new(Flaky { fail: false }));
        let obj = factory.create().unwrap();
        assert_eq!(factory.created_count(), 1);

        factory.destroy(obj).unwrap();
        assert_eq!(factory.destroyed_count(), 1);
    }

    #[test]
    fn failed_actions_do_not_count() {
        let factory = CountingFactory::new(Box::new(Flaky { fail: true }));
        let err = factory.create().unwrap_err();
        assert!(matches!(
            err,
            PoolError::FactoryAction {
                action: "create",
                ..
            }
        ));
        assert_eq!(factory.created_count(), 0);

        let err = factory.destroy(String::from("x")).unwrap_err();
        assert!(matches!(
            err,
            PoolError::FactoryAction {
                action: "destroy",
                ..
            }
        ));
        assert_eq!(factory.destroyed_count(), 0);
    }

    #[test]
    fn domain_errors_pass_through_unchanged() {
        let factory = CountingFactory::new(Box::new(DomainFailing));
        let err = factory.create().unwrap_err();
        assert!(matches!(err, PoolError::Closed { name } if name == "inner"));
    }

    #[test]
    fn short_id_uses_the_unqualified_type_name() {
        let label = short_id(&String::from("x"));
        assert!(label.starts_with("String@"), "{label}");

        let label = short_id(&Vec::<u8>::new());
        assert!(label.starts_with("Vec@"), "{label}");
    }

    #[test]
    fn default_validate_accepts_everything() {
        let factory = CountingFactory::new(Box::new(FnFactory::new(|| 1u8)));
        assert!(factory.validate(&1u8));
    }
}
