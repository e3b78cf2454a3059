//! Bounded backing store with a blocking wait policy and idle eviction

use crate::backend::PoolBackend;
use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::SharedFactory;
use crate::metrics::BackendCounters;
use crate::provider::Provider;

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct BoundedState<T> {
    idle: VecDeque<T>,
    num_active: usize,
    num_waiters: usize,
    shutdown: bool,
}

struct BoundedInner<T> {
    name: String,
    factory: SharedFactory<T>,
    state: Mutex<BoundedState<T>>,
    /// Signals waiters that capacity or an idle object became available.
    available: Condvar,
    /// Wakes the evictor; separate from `available` so eviction wakeups
    /// never consume a notification meant for a borrower.
    evictor_signal: Condvar,
    max_total: usize,
    max_idle: usize,
    min_idle: usize,
    max_wait_millis: i64,
    test_on_borrow: bool,
    test_on_return: bool,
    test_while_idle: bool,
}

/// Backing store enforcing `max_total`/`max_idle`/`min_idle`, a configurable
/// borrow wait (`-1` waits forever, `0` fails immediately) and a periodic
/// eviction run that trims idle objects down to `min_idle`.
pub(crate) struct BoundedBackend<T: Send + 'static> {
    inner: std::sync::Arc<BoundedInner<T>>,
    evictor: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> BoundedBackend<T> {
    pub(crate) fn new(name: &str, config: &PoolConfig, factory: SharedFactory<T>) -> PoolResult<Self> {
        let max_total = config.max_total.unwrap_or(1);
        if max_total == 0 {
            return Err(PoolError::BackendUnavailable {
                provider: Provider::BOUNDED_KEY.to_string(),
                detail: format!("pool '{name}' configured with max_total = 0"),
            });
        }

        let inner = std::sync::Arc::new(BoundedInner {
            name: name.to_string(),
            factory,
            state: Mutex::new(BoundedState {
                idle: VecDeque::new(),
                num_active: 0,
                num_waiters: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            evictor_signal: Condvar::new(),
            max_total,
            max_idle: config.max_idle.unwrap_or(max_total),
            min_idle: config.min_idle.unwrap_or(0),
            max_wait_millis: config.max_wait_millis.unwrap_or(-1),
            test_on_borrow: config.test_on_borrow.unwrap_or(true),
            test_on_return: config.test_on_return.unwrap_or(false),
            test_while_idle: config.test_while_idle.unwrap_or(false),
        });

        let evictor = match config.time_between_eviction_runs_millis {
            Some(millis) if millis > 0 => {
                let interval = Duration::from_millis(millis as u64);
                Some(spawn_evictor(std::sync::Arc::clone(&inner), interval)?)
            }
            _ => None,
        };

        Ok(Self {
            inner,
            evictor: Mutex::new(evictor),
        })
    }
}

impl<T: Send + 'static> fmt::Debug for BoundedBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBackend")
            .field("name", &self.inner.name)
            .field("max_total", &self.inner.max_total)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PoolBackend<T> for BoundedBackend<T> {
    fn acquire(&self) -> PoolResult<T> {
        let inner = &*self.inner;
        let deadline = match inner.max_wait_millis {
            millis if millis < 0 => None,
            millis => Some(Instant::now() + Duration::from_millis(millis as u64)),
        };

        let mut state = inner.state.lock();
        loop {
            if state.shutdown {
                return Err(PoolError::Closed {
                    name: inner.name.clone(),
                });
            }

            while let Some(object) = state.idle.pop_front() {
                if inner.test_on_borrow && !inner.factory.validate(&object) {
                    MutexGuard::unlocked(&mut state, || {
                        if let Err(err) = inner.factory.destroy(object) {
                            debug!(pool = %inner.name, error = %err, "failed to destroy invalid idle object");
                        }
                    });
                    continue;
                }
                state.num_active += 1;
                return Ok(object);
            }

            if state.num_active + state.idle.len() < inner.max_total {
                // reserve the slot before dropping the lock so concurrent
                // borrowers cannot overshoot max_total during creation
                state.num_active += 1;
                let created = MutexGuard::unlocked(&mut state, || inner.factory.create());
                return match created {
                    Ok(object) => Ok(object),
                    Err(err) => {
                        state.num_active -= 1;
                        inner.available.notify_one();
                        Err(err)
                    }
                };
            }

            state.num_waiters += 1;
            let timed_out = match deadline {
                None => {
                    inner.available.wait(&mut state);
                    false
                }
                Some(at) => inner.available.wait_until(&mut state, at).timed_out(),
            };
            state.num_waiters -= 1;

            if timed_out {
                return Err(PoolError::Exhausted {
                    wait: Duration::from_millis(inner.max_wait_millis.max(0) as u64),
                });
            }
        }
    }

    fn release(&self, mut object: T) -> PoolResult<()> {
        let inner = &*self.inner;
        let prepared = prepare_for_idle(inner, &mut object);

        let mut state = inner.state.lock();
        state.num_active = state.num_active.saturating_sub(1);

        if matches!(prepared, Ok(true)) && !state.shutdown && state.idle.len() < inner.max_idle {
            state.idle.push_back(object);
            inner.available.notify_one();
            return Ok(());
        }

        // capacity was freed even though the object is discarded
        inner.available.notify_one();
        MutexGuard::unlocked(&mut state, || {
            if let Err(err) = inner.factory.destroy(object) {
                debug!(pool = %inner.name, error = %err, "failed to destroy returned object");
            }
        });
        prepared.map(|_| ())
    }

    fn shutdown(&self) -> PoolResult<()> {
        let inner = &*self.inner;
        let victims: Vec<T> = {
            let mut state = inner.state.lock();
            if state.shutdown {
                return Ok(());
            }
            state.shutdown = true;
            inner.available.notify_all();
            inner.evictor_signal.notify_all();
            state.idle.drain(..).collect()
        };

        for object in victims {
            if let Err(err) = inner.factory.destroy(object) {
                warn!(pool = %inner.name, error = %err, "failed to destroy idle object during shutdown");
            }
        }

        if let Some(handle) = self.evictor.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn counters(&self) -> BackendCounters {
        let inner = &*self.inner;
        let state = inner.state.lock();
        BackendCounters {
            num_active: state.num_active,
            num_idle: state.idle.len(),
            num_waiters: state.num_waiters,
            created: inner.factory.created_count(),
            destroyed: inner.factory.destroyed_count(),
        }
    }
}

/// Reset the object and, when configured, validate it before it may go back
/// to the idle store. `Ok(false)` means "valid return but do not keep".
fn prepare_for_idle<T>(inner: &BoundedInner<T>, object: &mut T) -> PoolResult<bool> {
    inner.factory.reset(object)?;
    if inner.test_on_return && !inner.factory.validate(object) {
        return Ok(false);
    }
    Ok(true)
}

fn spawn_evictor<T: Send + 'static>(
    inner: std::sync::Arc<BoundedInner<T>>,
    interval: Duration,
) -> PoolResult<JoinHandle<()>> {
    let name = format!("{}-evictor", inner.name);
    std::thread::Builder::new()
        .name(name)
        .spawn(move || run_evictor(&inner, interval))
        .map_err(|err| PoolError::BackendUnavailable {
            provider: Provider::BOUNDED_KEY.to_string(),
            detail: format!("could not start eviction thread: {err}"),
        })
}

fn run_evictor<T: Send + 'static>(inner: &BoundedInner<T>, interval: Duration) {
    let mut state = inner.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        inner.evictor_signal.wait_for(&mut state, interval);
        if state.shutdown {
            return;
        }

        let victims = collect_victims(inner, &mut state);
        if victims.is_empty() {
            continue;
        }
        debug!(pool = %inner.name, count = victims.len(), "evicting idle objects");
        MutexGuard::unlocked(&mut state, || {
            for object in victims {
                if let Err(err) = inner.factory.destroy(object) {
                    debug!(pool = %inner.name, error = %err, "failed to destroy evicted object");
                }
            }
        });
        // destroyed idle objects free total capacity
        inner.available.notify_all();
    }
}

/// Every run evicts idle objects down to `min_idle`, oldest first; the
/// survivors are validated when `test_while_idle` is set.
fn collect_victims<T>(inner: &BoundedInner<T>, state: &mut BoundedState<T>) -> Vec<T> {
    let mut victims = Vec::new();
    while state.idle.len() > inner.min_idle {
        match state.idle.pop_front() {
            Some(object) => victims.push(object),
            None => break,
        }
    }
    if inner.test_while_idle {
        let mut kept = VecDeque::with_capacity(state.idle.len());
        while let Some(object) = state.idle.pop_front() {
            if inner.factory.validate(&object) {
                kept.push_back(object);
            } else {
                victims.push(object);
            }
        }
        state.idle = kept;
    }
    victims
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{CountingFactory, FactoryError, FnFactory, PoolObjectFactory};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(factory: impl PoolObjectFactory<u32> + 'static) -> SharedFactory<u32> {
        Arc::new(CountingFactory::new(Box::new(factory)))
    }

    fn sequence_factory() -> SharedFactory<u32> {
        let next = AtomicU32::new(0);
        counting(FnFactoryWithState { next })
    }

    struct FnFactoryWithState {
        next: AtomicU32,
    }

    impl PoolObjectFactory<u32> for FnFactoryWithState {
        fn create(&self) -> Result<u32, FactoryError> {
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn exhaustion_with_zero_wait_fails_immediately() {
        let mut cfg = PoolConfig::new().with_max_total(1).with_max_wait_millis(0);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let backend = BoundedBackend::new("t", &cfg, sequence_factory()).unwrap();

        let first = backend.acquire().unwrap();
        let err = backend.acquire().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));

        backend.release(first).unwrap();
        backend.acquire().unwrap();
    }

    #[test]
    fn waiter_is_woken_by_a_return() {
        let mut cfg = PoolConfig::new()
            .with_max_total(1)
            .with_max_wait_millis(2_000);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let backend = Arc::new(BoundedBackend::new("t", &cfg, sequence_factory()).unwrap());

        let object = backend.acquire().unwrap();
        let waiter = {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || backend.acquire())
        };
        // give the waiter time to block
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(backend.counters().num_waiters, 1);

        backend.release(object).unwrap();
        let got = waiter.join().unwrap().unwrap();
        assert_eq!(got, 0);
        assert_eq!(backend.counters().num_waiters, 0);
    }

    /// Hands out 0, 1, 2, ... and validates only odd values.
    struct OddOnly {
        next: AtomicU32,
    }

    impl PoolObjectFactory<u32> for OddOnly {
        fn create(&self) -> Result<u32, FactoryError> {
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }

        fn validate(&self, object: &u32) -> bool {
            object % 2 == 1
        }
    }

    #[test]
    fn invalid_idle_objects_are_destroyed_on_borrow() {
        let mut cfg = PoolConfig::new().with_max_total(2).with_test_on_borrow(true);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = counting(OddOnly {
            next: AtomicU32::new(0),
        });
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        // create 0 (invalid once idle) and return it
        let zero = backend.acquire().unwrap();
        assert_eq!(zero, 0);
        backend.release(zero).unwrap();

        // 0 fails validation and is destroyed, a fresh 1 is created
        let one = backend.acquire().unwrap();
        assert_eq!(one, 1);
        assert_eq!(factory.destroyed_count(), 1);
    }

    #[test]
    fn invalid_returns_are_destroyed_under_test_on_return() {
        let mut cfg = PoolConfig::new()
            .with_max_total(2)
            .with_test_on_borrow(false)
            .with_test_on_return(true);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = counting(OddOnly {
            next: AtomicU32::new(0),
        });
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let zero = backend.acquire().unwrap();
        let one = backend.acquire().unwrap();
        backend.release(zero).unwrap();
        backend.release(one).unwrap();

        // 0 fails return validation and is destroyed, 1 goes back idle
        let counters = backend.counters();
        assert_eq!(counters.num_idle, 1);
        assert_eq!(counters.num_active, 0);
        assert_eq!(factory.destroyed_count(), 1);
        assert_eq!(backend.acquire().unwrap(), 1);
    }

    #[test]
    fn evictor_destroys_invalid_survivors_under_test_while_idle() {
        let mut cfg = PoolConfig::new()
            .with_max_total(4)
            .with_max_idle(4)
            .with_min_idle(2)
            .with_test_on_borrow(false)
            .with_test_on_return(false)
            .with_test_while_idle(true)
            .with_eviction_interval_millis(20);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = counting(OddOnly {
            next: AtomicU32::new(0),
        });
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let zero = backend.acquire().unwrap();
        let one = backend.acquire().unwrap();
        let two = backend.acquire().unwrap();
        backend.release(zero).unwrap();
        backend.release(one).unwrap();
        backend.release(two).unwrap();
        assert_eq!(backend.counters().num_idle, 3);

        // the run trims 0 (oldest above min_idle) and destroys the invalid
        // survivor 2; only 1 passes validation
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(backend.counters().num_idle, 1);
        assert_eq!(factory.destroyed_count(), 2);
        assert_eq!(backend.acquire().unwrap(), 1);

        backend.shutdown().unwrap();
    }

    #[test]
    fn returns_above_max_idle_are_destroyed() {
        let mut cfg = PoolConfig::new().with_max_total(3).with_max_idle(1);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = sequence_factory();
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let a = backend.acquire().unwrap();
        let b = backend.acquire().unwrap();
        backend.release(a).unwrap();
        backend.release(b).unwrap();

        let counters = backend.counters();
        assert_eq!(counters.num_idle, 1);
        assert_eq!(factory.destroyed_count(), 1);
    }

    #[test]
    fn evictor_trims_idle_down_to_min_idle() {
        let mut cfg = PoolConfig::new()
            .with_max_total(4)
            .with_max_idle(4)
            .with_min_idle(1)
            .with_eviction_interval_millis(20);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = sequence_factory();
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let a = backend.acquire().unwrap();
        let b = backend.acquire().unwrap();
        let c = backend.acquire().unwrap();
        backend.release(a).unwrap();
        backend.release(b).unwrap();
        backend.release(c).unwrap();
        assert_eq!(backend.counters().num_idle, 3);

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(backend.counters().num_idle, 1);
        assert_eq!(factory.destroyed_count(), 2);

        backend.shutdown().unwrap();
    }

    #[test]
    fn shutdown_destroys_idle_and_rejects_acquire() {
        let mut cfg = PoolConfig::new().with_max_total(2);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = sequence_factory();
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let a = backend.acquire().unwrap();
        backend.release(a).unwrap();
        backend.shutdown().unwrap();
        backend.shutdown().unwrap();

        assert_eq!(factory.destroyed_count(), 1);
        assert!(matches!(
            backend.acquire().unwrap_err(),
            PoolError::Closed { .. }
        ));
    }

    #[test]
    fn release_after_shutdown_destroys_the_object() {
        let mut cfg = PoolConfig::new().with_max_total(2);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let factory = sequence_factory();
        let backend = BoundedBackend::new("t", &cfg, Arc::clone(&factory)).unwrap();

        let a = backend.acquire().unwrap();
        backend.shutdown().unwrap();
        backend.release(a).unwrap();

        assert_eq!(factory.destroyed_count(), 1);
        assert_eq!(backend.counters().num_active, 0);
    }

    #[test]
    fn zero_max_total_is_a_misconfiguration() {
        let mut cfg = PoolConfig::new().with_max_total(0);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let err = BoundedBackend::new("t", &cfg, sequence_factory()).unwrap_err();
        assert!(matches!(err, PoolError::BackendUnavailable { .. }));
    }

    #[test]
    fn create_failure_releases_the_reserved_slot() {
        struct FailingAfter {
            remaining: AtomicU32,
        }

        impl PoolObjectFactory<u32> for FailingAfter {
            fn create(&self) -> Result<u32, FactoryError> {
                if self.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                    Ok(1)
                } else {
                    Err("factory dried up".into())
                }
            }
        }

        let mut cfg = PoolConfig::new().with_max_total(1).with_max_wait_millis(0);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let backend = BoundedBackend::new(
            "t",
            &cfg,
            counting(FailingAfter {
                remaining: AtomicU32::new(0),
            }),
        )
        .unwrap();

        let err = backend.acquire().unwrap_err();
        assert!(matches!(err, PoolError::FactoryAction { action: "create", .. }));
        // the reserved slot was released, not leaked
        assert_eq!(backend.counters().num_active, 0);
    }

    #[test]
    fn fn_factory_objects_are_created_on_demand() {
        let mut cfg = PoolConfig::new().with_max_total(1);
        cfg.apply_defaults(&PoolConfig::builtin_defaults());
        let backend =
            BoundedBackend::new("t", &cfg, counting(FnFactory::new(|| 5u32))).unwrap();
        assert_eq!(backend.acquire().unwrap(), 5);
    }
}
