//! Multi-threaded behaviour of the condition variables.
//!
//! Every scenario runs against the native condition and the generic one,
//! the latter over both semaphore flavours where the host has both.

use foundation_sal::native::{NativeCondition, NativeMutex};
use foundation_sal::{
    ConditionState, GenericCondition, GenericMutex, GenericSemaphore, RawCondition, RawMutex,
    RawSemaphore, SalError,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(any(target_os = "linux", target_os = "android"))]
use foundation_sal::native::NativeSemaphore;

/// State shared between a test and its waiters. The counters are only
/// changed while `mutex` is held.
struct Shared<C: RawCondition> {
    mutex: C::Mutex,
    cond: C,
    tokens: AtomicUsize,
    entered: AtomicUsize,
    woken: AtomicUsize,
}

impl<C: RawCondition> Shared<C> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            mutex: C::Mutex::new().unwrap(),
            cond: C::new().unwrap(),
            tokens: AtomicUsize::new(0),
            entered: AtomicUsize::new(0),
            woken: AtomicUsize::new(0),
        })
    }

    fn add_tokens(&self, count: usize) {
        self.mutex.lock().unwrap();
        self.tokens.fetch_add(count, Ordering::Relaxed);
        self.mutex.unlock().unwrap();
    }

    /// Returns once `count` waiters have released `mutex` inside a wait.
    fn wait_until_parked(&self, count: usize) {
        loop {
            self.mutex.lock().unwrap();
            let entered = self.entered.load(Ordering::Relaxed);
            self.mutex.unlock().unwrap();
            if entered == count {
                return;
            }
            thread::yield_now();
        }
    }

    fn wait_until_woken(&self, count: usize) {
        while self.woken.load(Ordering::Relaxed) < count {
            thread::yield_now();
        }
    }
}

fn spawn_waiters<C>(shared: &Arc<Shared<C>>, count: usize) -> Vec<JoinHandle<()>>
where
    C: RawCondition + 'static,
{
    (0..count)
        .map(|_| {
            let shared = Arc::clone(shared);
            thread::spawn(move || {
                shared.mutex.lock().unwrap();
                shared.entered.fetch_add(1, Ordering::Relaxed);
                while shared.tokens.load(Ordering::Relaxed) == 0 {
                    shared.cond.wait(&shared.mutex).unwrap();
                }
                shared.tokens.fetch_sub(1, Ordering::Relaxed);
                shared.woken.fetch_add(1, Ordering::Relaxed);
                shared.mutex.unlock().unwrap();
            })
        })
        .collect()
}

fn signal_wakes_one_broadcast_wakes_rest<C: RawCondition + 'static>() {
    let waiters = 4;
    let shared = Shared::<C>::new();
    let handles = spawn_waiters(&shared, waiters);
    shared.wait_until_parked(waiters);

    // one token, one signal: exactly one waiter gets through
    shared.add_tokens(1);
    shared.cond.signal().unwrap();
    shared.wait_until_woken(1);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(shared.woken.load(Ordering::Relaxed), 1);

    shared.add_tokens(waiters - 1);
    shared.cond.broadcast().unwrap();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(shared.woken.load(Ordering::Relaxed), waiters);
}

fn no_lost_wakeup<C: RawCondition + 'static>() {
    let rounds = 200;
    let shared = Shared::<C>::new();

    let consumer = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for _ in 0..rounds {
                shared.mutex.lock().unwrap();
                while shared.tokens.load(Ordering::Relaxed) == 0 {
                    shared.cond.wait(&shared.mutex).unwrap();
                }
                shared.tokens.fetch_sub(1, Ordering::Relaxed);
                shared.woken.fetch_add(1, Ordering::Relaxed);
                shared.mutex.unlock().unwrap();
            }
        })
    };

    // signal while holding the mutex on even rounds, after releasing it on odd ones
    for round in 0..rounds {
        shared.mutex.lock().unwrap();
        shared.tokens.fetch_add(1, Ordering::Relaxed);
        if round % 2 == 0 {
            shared.cond.signal().unwrap();
            shared.mutex.unlock().unwrap();
        } else {
            shared.mutex.unlock().unwrap();
            shared.cond.signal().unwrap();
        }
    }

    consumer.join().unwrap();
    assert_eq!(shared.woken.load(Ordering::Relaxed), rounds);
}

fn timed_wait_honors_bound<C: RawCondition>() {
    let timeout = Duration::from_millis(50);
    let mutex = C::Mutex::new().unwrap();
    let cond = C::new().unwrap();

    mutex.lock().unwrap();
    let start = Instant::now();
    let result = loop {
        let result = cond.timed_wait(&mutex, timeout).unwrap();
        if result.timed_out() {
            break result;
        }
    };
    let elapsed = start.elapsed();
    assert!(result.timed_out());
    assert!(elapsed >= timeout, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "returned after {elapsed:?}");

    // the mutex is held again: one unlock succeeds, the next is refused
    mutex.unlock().unwrap();
    assert_eq!(mutex.unlock(), Err(SalError::NotOwner));

    cond.destroy().unwrap();
    mutex.destroy().unwrap();
}

fn mutex_held_after_wait<C: RawCondition + 'static>() {
    let shared = Shared::<C>::new();
    let handles = spawn_waiters(&shared, 1);
    shared.wait_until_parked(1);

    shared.add_tokens(1);
    shared.cond.signal().unwrap();
    handles.into_iter().for_each(|handle| handle.join().unwrap());

    // the waiter unlocked after its wait returned, so it held the mutex then
    shared.mutex.lock().unwrap();
    shared.mutex.unlock().unwrap();
}

fn destroy_after_drain<C: RawCondition + 'static>() {
    let shared = Shared::<C>::new();
    let handles = spawn_waiters(&shared, 3);
    shared.wait_until_parked(3);

    shared.add_tokens(3);
    shared.cond.broadcast().unwrap();
    handles.into_iter().for_each(|handle| handle.join().unwrap());

    let shared = Arc::into_inner(shared).expect("waiters are gone");
    shared.cond.destroy().unwrap();
    shared.mutex.destroy().unwrap();
}

/// The generic handshake makes `signal` and `broadcast` return only after the
/// waiters they released have unregistered.
fn handshake_accounts_for_waiters<S: RawSemaphore + 'static>() {
    let waiters = 3;
    let shared = Shared::<GenericCondition<S>>::new();
    let handles = spawn_waiters(&shared, waiters);
    shared.wait_until_parked(waiters);
    assert_eq!(
        shared.cond.snapshot(),
        Ok(ConditionState {
            waiting: waiters,
            signals: 0
        })
    );

    shared.add_tokens(1);
    shared.cond.signal().unwrap();
    assert_eq!(
        shared.cond.snapshot(),
        Ok(ConditionState {
            waiting: waiters - 1,
            signals: 0
        })
    );

    shared.add_tokens(waiters - 1);
    shared.cond.broadcast().unwrap();
    assert_eq!(
        shared.cond.snapshot(),
        Ok(ConditionState {
            waiting: 0,
            signals: 0
        })
    );

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Timeouts racing signals and broadcasts must neither strand a signaler nor
/// leave claims behind.
fn timeouts_race_signals<S: RawSemaphore + 'static>() {
    let shared = Shared::<GenericCondition<S>>::new();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..50 {
                    shared.mutex.lock().unwrap();
                    shared
                        .cond
                        .timed_wait(&shared.mutex, Duration::from_millis(1))
                        .unwrap();
                    shared.mutex.unlock().unwrap();
                }
            })
        })
        .collect();

    let signaler = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for round in 0..200 {
                if round % 3 == 0 {
                    shared.cond.broadcast().unwrap();
                } else {
                    shared.cond.signal().unwrap();
                }
            }
        })
    };

    for handle in waiters {
        handle.join().unwrap();
    }
    signaler.join().unwrap();

    assert_eq!(
        shared.cond.snapshot(),
        Ok(ConditionState {
            waiting: 0,
            signals: 0
        })
    );
}

/// Many short timed waits against concurrent signallers and broadcasters.
/// Every claimed signal must be acknowledged, otherwise a signaller stays
/// parked on `wait_done` and the run never finishes.
fn heavy_timeouts_race_signals<S: RawSemaphore + 'static>() {
    let waiters = 8;
    let rounds = 400;
    let shared = Shared::<GenericCondition<S>>::new();
    let finished = Arc::new(AtomicUsize::new(0));

    let waiter_handles: Vec<_> = (0..waiters)
        .map(|_| {
            let (shared, finished) = (Arc::clone(&shared), Arc::clone(&finished));
            thread::spawn(move || {
                for _ in 0..rounds {
                    shared.mutex.lock().unwrap();
                    shared
                        .cond
                        .timed_wait(&shared.mutex, Duration::from_micros(50))
                        .unwrap();
                    shared.mutex.unlock().unwrap();
                }
                finished.fetch_add(1, Ordering::Release);
            })
        })
        .collect();

    let signaller_handles: Vec<_> = (0..3)
        .map(|id| {
            let (shared, finished) = (Arc::clone(&shared), Arc::clone(&finished));
            thread::spawn(move || {
                let mut round = 0usize;
                while finished.load(Ordering::Acquire) < waiters {
                    if (round + id) % 4 == 0 {
                        shared.cond.broadcast().unwrap();
                    } else {
                        shared.cond.signal().unwrap();
                    }
                    round += 1;
                }
            })
        })
        .collect();

    for handle in waiter_handles.into_iter().chain(signaller_handles) {
        handle.join().unwrap();
    }

    assert_eq!(
        shared.cond.snapshot(),
        Ok(ConditionState {
            waiting: 0,
            signals: 0
        })
    );
}

#[test]
#[ntest::timeout(10000)]
fn test_native_signal_and_broadcast() {
    signal_wakes_one_broadcast_wakes_rest::<NativeCondition>();
}

#[test]
#[ntest::timeout(10000)]
fn test_generic_signal_and_broadcast() {
    signal_wakes_one_broadcast_wakes_rest::<GenericCondition<GenericSemaphore>>();
}

#[test]
#[ntest::timeout(10000)]
fn test_native_no_lost_wakeup() {
    no_lost_wakeup::<NativeCondition>();
}

#[test]
#[ntest::timeout(10000)]
fn test_generic_no_lost_wakeup() {
    no_lost_wakeup::<GenericCondition<GenericSemaphore>>();
}

#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_native_timed_wait_honors_bound() {
    timed_wait_honors_bound::<NativeCondition>();
}

#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_generic_timed_wait_honors_bound() {
    timed_wait_honors_bound::<GenericCondition<GenericSemaphore>>();
}

#[test]
#[ntest::timeout(10000)]
fn test_mutex_held_after_wait() {
    mutex_held_after_wait::<NativeCondition>();
    mutex_held_after_wait::<GenericCondition<GenericSemaphore>>();
}

#[test]
#[ntest::timeout(10000)]
fn test_destroy_after_drain() {
    destroy_after_drain::<NativeCondition>();
    destroy_after_drain::<GenericCondition<GenericSemaphore>>();
}

#[test]
#[ntest::timeout(10000)]
fn test_generic_handshake_over_generic_semaphore() {
    handshake_accounts_for_waiters::<GenericSemaphore>();
}

#[test]
#[ntest::timeout(20000)]
fn test_generic_timeouts_race_signals() {
    timeouts_race_signals::<GenericSemaphore>();
}

#[test]
#[ntest::timeout(60000)]
fn test_generic_heavy_timeouts_race_signals() {
    heavy_timeouts_race_signals::<GenericSemaphore>();
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod over_native_semaphore {
    use super::*;

    type Cond = GenericCondition<NativeSemaphore>;

    #[test]
    #[ntest::timeout(10000)]
    fn test_signal_and_broadcast() {
        signal_wakes_one_broadcast_wakes_rest::<Cond>();
    }

    #[test]
    #[ntest::timeout(10000)]
    fn test_no_lost_wakeup() {
        no_lost_wakeup::<Cond>();
    }

    #[test]
    #[serial]
    #[ntest::timeout(10000)]
    fn test_timed_wait_honors_bound() {
        timed_wait_honors_bound::<Cond>();
    }

    #[test]
    #[ntest::timeout(10000)]
    fn test_handshake() {
        handshake_accounts_for_waiters::<NativeSemaphore>();
    }

    #[test]
    #[ntest::timeout(20000)]
    fn test_timeouts_race_signals() {
        timeouts_race_signals::<NativeSemaphore>();
    }

    #[test]
    #[ntest::timeout(60000)]
    fn test_heavy_timeouts_race_signals() {
        heavy_timeouts_race_signals::<NativeSemaphore>();
    }
}

#[test]
#[ntest::timeout(10000)]
fn test_generic_condition_waits_on_generic_mutex() {
    let mutex = Arc::new(GenericMutex::<GenericSemaphore>::new().unwrap());
    let cond = Arc::new(GenericCondition::<GenericSemaphore>::new().unwrap());
    let ready = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let (mutex, cond, ready) = (Arc::clone(&mutex), Arc::clone(&cond), Arc::clone(&ready));
        thread::spawn(move || {
            mutex.lock().unwrap();
            while ready.load(Ordering::Relaxed) == 0 {
                cond.wait_on(&*mutex).unwrap();
            }
            assert!(mutex.is_held_by_current_thread());
            mutex.unlock().unwrap();
        })
    };

    mutex.lock().unwrap();
    ready.store(1, Ordering::Relaxed);
    mutex.unlock().unwrap();
    cond.broadcast().unwrap();

    waiter.join().unwrap();
}

#[test]
fn test_generic_wait_without_holding_mutex_fails() {
    let mutex = GenericMutex::<GenericSemaphore>::new().unwrap();
    let cond = GenericCondition::<GenericSemaphore>::new().unwrap();

    assert_eq!(cond.wait_on(&mutex), Err(SalError::NotOwner));
    assert_eq!(
        cond.snapshot(),
        Ok(ConditionState {
            waiting: 0,
            signals: 0
        })
    );
}
