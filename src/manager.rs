//! Process-wide named pool registry with ordered shutdown

use crate::config::PoolConfigMap;
use crate::errors::{PoolError, PoolResult};
use crate::factory::PoolObjectFactory;
use crate::pool::{ManagedPool, Pool};
use crate::provider::build_pool;
use crate::singleton::LazyInitSingleton;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::OnceLock;
use tracing::debug;

const FACTORY_SUFFIX: &str = "Factory";

/// Central registry and lifecycle owner for all application pools. Supports
/// concurrent register/lookup/iterate without external locking; it is never
/// consulted in the per-borrow hot path.
///
/// # Examples
///
/// ```
/// use poolside::{FnFactory, PoolConfig, PoolManager, build_pool};
///
/// let manager = PoolManager::new();
/// let pool = build_pool("ids", PoolConfig::new(), Box::new(FnFactory::new(|| 0u64))).unwrap();
/// manager.register("ids", &pool).unwrap();
///
/// let same = manager.get::<u64>("ids").unwrap();
/// assert_eq!(same.name(), "ids");
/// manager.close_all();
/// ```
#[derive(Default)]
pub struct PoolManager {
    pools: DashMap<String, Box<dyn ManagedPool>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pool` under `name`. Duplicate names are a programming
    /// error, not a race to resolve: the call fails and the existing entry
    /// is left untouched.
    pub fn register<T: Send + 'static>(&self, name: &str, pool: &Pool<T>) -> PoolResult<()> {
        match self.pools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(PoolError::DuplicateRegistration {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Box::new(pool.clone()));
                debug!(pool = name, "registered pool");
                Ok(())
            }
        }
    }

    /// Typed lookup. Returns `None` when the name is unknown or the
    /// registered pool manages a different object type.
    pub fn get<T: Send + 'static>(&self, name: &str) -> Option<Pool<T>> {
        self.pools
            .get(name)
            .and_then(|entry| entry.as_any().downcast_ref::<Pool<T>>().cloned())
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    pub fn size(&self) -> usize {
        self.pools.len()
    }

    /// Registered pool names.
    pub fn names(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Visit every registered pool through its type-erased lifecycle view.
    pub fn each(&self, mut f: impl FnMut(&str, &dyn ManagedPool)) {
        for entry in self.pools.iter() {
            f(entry.key(), entry.value().as_ref());
        }
    }

    /// Close every registered pool and clear the registry. Pool close never
    /// fails visibly, so one pool's shutdown trouble cannot prevent the
    /// others from closing.
    pub fn close_all(&self) {
        self.each(|name, pool| {
            debug!(pool = name, "closing registered pool");
            pool.close();
        });
        self.pools.clear();
    }

    /// Build a pool for `factory_name`, resolve its configuration from
    /// `configs` and register it under the conventional pool name. On a
    /// registration failure the freshly built pool is closed before the
    /// error propagates.
    pub fn create_pool<T: Send + 'static>(
        &self,
        factory_name: &str,
        configs: &mut PoolConfigMap,
        factory: Box<dyn PoolObjectFactory<T>>,
    ) -> PoolResult<Pool<T>> {
        let pool_name = pool_name_for_factory(factory_name);
        let config = configs.get_config(&pool_name);
        let pool = build_pool(&pool_name, config, factory)?;
        if let Err(err) = self.register(&pool_name, &pool) {
            pool.close();
            return Err(err);
        }
        Ok(pool)
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// The process-default [`PoolManager`] holder. Constructed lazily on first
/// use; call [`LazyInitSingleton::set`] before the first `get()` to
/// pre-register a manager built elsewhere.
pub fn default_manager() -> &'static LazyInitSingleton<PoolManager> {
    static HOLDER: OnceLock<LazyInitSingleton<PoolManager>> = OnceLock::new();
    HOLDER.get_or_init(|| LazyInitSingleton::of(PoolManager::new))
}

/// Derive the conventional pool name from its producing factory's name:
/// a trailing `Factory` is stripped and the remainder is kebab-cased,
/// e.g. `MyResourceFactory` -> `my-resource`.
pub fn pool_name_for_factory(factory_name: &str) -> String {
    let base = factory_name
        .strip_suffix(FACTORY_SUFFIX)
        .unwrap_or(factory_name);
    to_kebab_case(base)
}

#[derive(PartialEq, Clone, Copy)]
enum CharKind {
    Upper,
    Lower,
    Digit,
    Other,
}

fn kind_of(ch: char) -> CharKind {
    if ch.is_uppercase() {
        CharKind::Upper
    } else if ch.is_lowercase() {
        CharKind::Lower
    } else if ch.is_numeric() {
        CharKind::Digit
    } else {
        CharKind::Other
    }
}

/// Split on character-type boundaries, keeping the last upper-case letter of
/// an acronym with the camel-case word it starts (`XMLParser` -> `xml-parser`),
/// then join with dashes and lower-case.
pub fn to_kebab_case(input: &str) -> String {
    if input.trim().is_empty() {
        return input.to_string();
    }

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_kind: Option<CharKind> = None;

    for ch in input.chars() {
        let kind = kind_of(ch);
        match prev_kind {
            Some(prev) if prev != kind => {
                if prev == CharKind::Upper && kind == CharKind::Lower {
                    let last = current.pop();
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                    if let Some(last) = last {
                        current.push(last);
                    }
                } else {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
        current.push(ch);
        prev_kind = Some(kind);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join("-").to_lowercase()
}
