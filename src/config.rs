//! Pool configuration and per-name configuration map

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_POOL_NAME: &str = "default";

/// Configuration for a single pool. All fields are optional before merging;
/// missing fields are filled in from a defaults entry via [`apply_defaults`].
///
/// `max_wait_millis = -1` means block indefinitely on borrow;
/// `time_between_eviction_runs_millis` that is not positive disables the
/// eviction thread.
///
/// # Examples
///
/// ```
/// use poolside::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_max_total(4)
///     .with_max_wait_millis(0);
///
/// assert_eq!(config.max_total, Some(4));
/// assert_eq!(config.max_wait_millis, Some(0));
/// ```
///
/// [`apply_defaults`]: PoolConfig::apply_defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PoolConfig {
    /// Key selecting which backing adapter builds this pool.
    pub provider: Option<String>,

    /// Maximum number of objects this pool may have allocated at once.
    pub max_total: Option<usize>,

    /// Maximum number of idle objects kept in the pool.
    pub max_idle: Option<usize>,

    /// Minimum number of idle objects the evictor leaves in place.
    pub min_idle: Option<usize>,

    /// Validate objects before handing them out.
    pub test_on_borrow: Option<bool>,

    /// Validate objects when they come back.
    pub test_on_return: Option<bool>,

    /// Validate idle objects during eviction runs.
    pub test_while_idle: Option<bool>,

    /// Maximum time in milliseconds a borrow may block. `-1` blocks forever,
    /// `0` fails immediately.
    pub max_wait_millis: Option<i64>,

    /// Interval in milliseconds between eviction runs; not positive disables
    /// the evictor.
    pub time_between_eviction_runs_millis: Option<i64>,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in fallback values, used when no `"default"` entry supplies one.
    pub fn builtin_defaults() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            provider: None,
            max_total: Some(cpus * 4),
            max_idle: Some(cpus),
            min_idle: Some(0),
            test_on_borrow: Some(true),
            test_on_return: Some(false),
            test_while_idle: Some(false),
            max_wait_millis: Some(5000),
            time_between_eviction_runs_millis: Some(-1),
        }
    }

    /// Fill every unset field from `defaults`. The provider key is never
    /// inherited; it must be set on the pool's own entry.
    pub fn apply_defaults(&mut self, defaults: &PoolConfig) {
        self.max_total = self.max_total.or(defaults.max_total);
        self.max_idle = self.max_idle.or(defaults.max_idle);
        self.min_idle = self.min_idle.or(defaults.min_idle);
        self.test_on_borrow = self.test_on_borrow.or(defaults.test_on_borrow);
        self.test_on_return = self.test_on_return.or(defaults.test_on_return);
        self.test_while_idle = self.test_while_idle.or(defaults.test_while_idle);
        self.max_wait_millis = self.max_wait_millis.or(defaults.max_wait_millis);
        self.time_between_eviction_runs_millis = self
            .time_between_eviction_runs_millis
            .or(defaults.time_between_eviction_runs_millis);
    }

    pub fn with_provider(mut self, key: impl Into<String>) -> Self {
        self.provider = Some(key.into());
        self
    }

    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = Some(max_total);
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = Some(max_idle);
        self
    }

    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = Some(min_idle);
        self
    }

    pub fn with_test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = Some(enabled);
        self
    }

    pub fn with_test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = Some(enabled);
        self
    }

    pub fn with_test_while_idle(mut self, enabled: bool) -> Self {
        self.test_while_idle = Some(enabled);
        self
    }

    pub fn with_max_wait_millis(mut self, millis: i64) -> Self {
        self.max_wait_millis = Some(millis);
        self
    }

    pub fn with_eviction_interval_millis(mut self, millis: i64) -> Self {
        self.time_between_eviction_runs_millis = Some(millis);
        self
    }
}

/// All pool configurations keyed by pool name. Binds from a structured
/// configuration tree under `config.<name>.*`; entries missing a field
/// inherit from the `"default"` entry, which itself inherits the built-ins.
///
/// # Examples
///
/// ```
/// use poolside::PoolConfigMap;
///
/// let yaml = r#"
/// config:
///   default:
///     max-total: 8
///   parsers:
///     provider: cached
/// "#;
/// let mut map: PoolConfigMap = serde_yaml::from_str(yaml).unwrap();
/// let parsers = map.get_config("parsers");
/// assert_eq!(parsers.provider.as_deref(), Some("cached"));
/// assert_eq!(parsers.max_total, Some(8));
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfigMap {
    config: HashMap<String, PoolConfig>,
}

impl PoolConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry for `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, config: PoolConfig) {
        self.config.insert(name.into(), config);
    }

    /// Resolve the configuration for `name`, merging in the defaults entry.
    /// Unknown names yield (and cache) the defaults.
    pub fn get_config(&mut self, name: &str) -> PoolConfig {
        let defaults = self.default_config();
        self.merged(name, defaults)
    }

    fn default_config(&mut self) -> PoolConfig {
        self.merged(DEFAULT_POOL_NAME, PoolConfig::builtin_defaults())
    }

    fn merged(&mut self, name: &str, defaults: PoolConfig) -> PoolConfig {
        match self.config.get_mut(name) {
            Some(config) => {
                config.apply_defaults(&defaults);
                config.clone()
            }
            None => {
                self.config.insert(name.to_string(), defaults.clone());
                defaults
            }
        }
    }
}
