//! Thread-safe, exactly-once lazy-initialization holder

use crate::errors::SingletonError;

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// A holder for at most one shared instance of `T`, initialized exactly once.
///
/// The instance can be set explicitly before first use (pre-registration,
/// e.g. by wiring code that builds the instance itself) or constructed
/// lazily from the fallback supplier on the first [`get`](Self::get). A fast
/// read path short-circuits the common case; initialization falls back to a
/// synchronized compare-and-set so that under concurrent first use exactly
/// one caller's supplier runs and every caller observes the same instance.
///
/// # Examples
///
/// ```
/// use poolside::LazyInitSingleton;
///
/// let holder = LazyInitSingleton::of(|| vec![1, 2, 3]);
/// assert!(!holder.is_initialized());
///
/// let first = holder.get();
/// let second = holder.get();
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
pub struct LazyInitSingleton<T> {
    supplier: Box<dyn Fn() -> T + Send + Sync>,
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> LazyInitSingleton<T> {
    /// Create an uninitialized holder with `supplier` as the lazy fallback.
    pub fn of(supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            supplier: Box::new(supplier),
            slot: RwLock::new(None),
        }
    }

    /// The held instance, constructing it via the fallback supplier on first
    /// call.
    pub fn get(&self) -> Arc<T> {
        loop {
            if let Some(instance) = &*self.slot.read() {
                return Arc::clone(instance);
            }
            // losing the compare-and-set race is fine, the next read sees
            // the winner's instance
            let _ = self.set_instance(None, || Some(Arc::new((self.supplier)())));
        }
    }

    /// Eagerly initialize with `value`. Fails if already initialized -
    /// explicit pre-registration must happen before the first `get()`.
    pub fn set(&self, value: T) -> Result<(), SingletonError> {
        self.set_with(move || value)
    }

    /// Like [`set`](Self::set) but the value is produced only if the holder
    /// is still uninitialized.
    pub fn set_with(&self, supplier: impl FnOnce() -> T) -> Result<(), SingletonError> {
        match self.set_instance(None, || Some(Arc::new(supplier())))? {
            true => Ok(()),
            false => Err(SingletonError::AlreadyInitialized),
        }
    }

    /// Initialize only if absent. Returns whether this call set the value.
    pub fn set_if_absent(&self, value: T) -> bool {
        self.set_if_absent_with(move || value)
    }

    pub fn set_if_absent_with(&self, supplier: impl FnOnce() -> T) -> bool {
        if self.slot.read().is_some() {
            return false;
        }
        self.set_instance(None, || Some(Arc::new(supplier())))
            .unwrap_or(false)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Force the holder back to uninitialized. Restricted to tests and
    /// special lifecycle code.
    pub fn reset(&self) {
        let current = match &*self.slot.read() {
            Some(instance) => Arc::clone(instance),
            None => return,
        };
        debug!("resetting singleton holder");
        let _ = self.set_instance(Some(&current), || None);
    }

    /// Synchronized compare-and-set: the slot is updated only if it still
    /// holds `expected` (by reference equality). A produced value that is
    /// reference-equal to the current one signals accidental re-entrant
    /// re-initialization and is a state error, never a silent no-op.
    fn set_instance(
        &self,
        expected: Option<&Arc<T>>,
        produce: impl FnOnce() -> Option<Arc<T>>,
    ) -> Result<bool, SingletonError> {
        let mut slot = self.slot.write();
        let unchanged = match (slot.as_ref(), expected) {
            (None, None) => true,
            (Some(current), Some(expected)) => Arc::ptr_eq(current, expected),
            _ => false,
        };
        if !unchanged {
            return Ok(false);
        }

        let value = produce();
        if let (Some(current), Some(value)) = (slot.as_ref(), value.as_ref()) {
            if Arc::ptr_eq(current, value) {
                return Err(SingletonError::Reinitialized);
            }
        }
        *slot = value;
        Ok(true)
    }
}
