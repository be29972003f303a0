//! A condition variable assembled from a native mutex and two semaphores.
//!
//! Waiters register themselves in `waiting`, release the caller's mutex and
//! park on `wait_sem`. A signaler claims one waiter by bumping `signals`,
//! posts `wait_sem`, then blocks on `wait_done` until that waiter has
//! unregistered. The handshake guarantees a signal is never handed to a
//! thread that starts waiting after it was sent, and that a broadcaster only
//! returns once every waiter it released has left the wait.
//!
//! `0 <= signals <= waiting` holds whenever `lock` is held.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;

use sal_logs::{debug, error, warn};

use crate::errors::{first_error, SalError, SalResult};
use crate::native::NativeMutex;
use crate::platform::{Mutex, Semaphore};
use crate::traits::{RawCondition, RawMutex, RawSemaphore, WaitTimeoutResult};

/// Point-in-time view of a [`GenericCondition`]'s bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionState {
    /// Threads currently parked in a wait.
    pub waiting: usize,
    /// Signals sent but not yet acknowledged by a waiter.
    pub signals: usize,
}

pub struct GenericCondition<S: RawSemaphore = Semaphore> {
    lock: NativeMutex,
    waiting: AtomicUsize,
    signals: AtomicUsize,
    wait_sem: S,
    wait_done: S,
}

impl<S: RawSemaphore> GenericCondition<S> {
    /// Releases `mutex`, blocks until signalled, then reacquires `mutex`.
    ///
    /// Works with any [`RawMutex`], native or generic.
    ///
    /// # Errors
    ///
    /// See [`GenericCondition::timed_wait_on`].
    pub fn wait_on<M: RawMutex>(&self, mutex: &M) -> SalResult<()> {
        self.timed_wait_on(mutex, None).map(|_| ())
    }

    /// Releases `mutex`, blocks until signalled or until `timeout` elapses,
    /// then reacquires `mutex`. `None` waits without bound.
    ///
    /// # Errors
    ///
    /// Returns the error of unlocking `mutex`, in which case nothing was
    /// waited on and the caller still holds it. A hard failure of the
    /// internal semaphore is returned without relocking `mutex`. Any other
    /// error is returned after `mutex` was relocked.
    pub fn timed_wait_on<M: RawMutex>(
        &self,
        mutex: &M,
        timeout: Option<Duration>,
    ) -> SalResult<WaitTimeoutResult> {
        self.locked(|| {
            self.waiting.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })?;

        if let Err(err) = mutex.unlock() {
            // a signaler may already have claimed us; settle it like a timeout
            if let Err(leave_err) = self.leave(true) {
                error!("failed to unregister waiter: {}", leave_err);
            }
            return Err(err);
        }

        let waited = match timeout {
            Some(timeout) => self.wait_sem.timed_wait(timeout),
            None => self.wait_sem.wait(),
        };
        let have_timeout = match waited {
            Ok(()) => false,
            Err(SalError::TimedOut) => true,
            Err(err) => {
                error!("generic condition wait failed: {}", err);
                return Err(err);
            }
        };

        let left = self.leave(have_timeout);
        let relocked = mutex.lock();
        first_error(left, relocked).map(|()| WaitTimeoutResult::new(have_timeout))
    }

    /// Reads `waiting` and `signals` under the internal lock.
    ///
    /// # Errors
    ///
    /// Returns the internal lock's error.
    pub fn snapshot(&self) -> SalResult<ConditionState> {
        self.locked(|| {
            Ok(ConditionState {
                waiting: self.waiting.load(Ordering::Relaxed),
                signals: self.signals.load(Ordering::Relaxed),
            })
        })
    }

    fn locked<R>(&self, body: impl FnOnce() -> SalResult<R>) -> SalResult<R> {
        self.lock.lock()?;
        let result = body();
        first_error(result, self.lock.unlock())
    }

    /// Unregisters a waiter, acknowledging a pending signal if it owns one.
    ///
    /// A waiter that never took a unit from `wait_sem` drains one first. When
    /// none is left another waiter already took it and acknowledges that
    /// signal itself.
    fn leave(&self, have_timeout: bool) -> SalResult<()> {
        self.locked(|| {
            let mut result = Ok(());
            if self.signals.load(Ordering::Relaxed) > 0 {
                let owns_signal = if have_timeout {
                    match self.wait_sem.timed_wait(Duration::ZERO) {
                        Ok(()) => true,
                        Err(SalError::TimedOut) => false,
                        Err(err) => {
                            result = Err(err);
                            true
                        }
                    }
                } else {
                    true
                };

                if owns_signal {
                    result = result.and(self.wait_done.post());
                    self.signals.fetch_sub(1, Ordering::Relaxed);
                }
            }
            self.waiting.fetch_sub(1, Ordering::Relaxed);
            result
        })
    }

    /// Posts `wait_sem` up to `count` times while `lock` is held. Claims that
    /// could not be posted are withdrawn from `signals`.
    fn release(&self, count: usize) -> (usize, SalResult<()>) {
        for released in 0..count {
            if let Err(err) = self.wait_sem.post() {
                self.signals.fetch_sub(count - released, Ordering::Relaxed);
                error!(
                    "generic condition released {} of {} waiters: {}",
                    released, count, err
                );
                return (released, Err(err));
            }
        }
        (count, Ok(()))
    }

    /// Waits for `count` waiters to acknowledge their wake-up.
    fn collect(&self, count: usize) -> SalResult<()> {
        for _ in 0..count {
            if let Err(err) = self.wait_done.wait() {
                error!("generic condition lost a wake-up acknowledgement: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl<S: RawSemaphore> RawCondition for GenericCondition<S> {
    type Mutex = Mutex;

    fn new() -> SalResult<Self> {
        let lock = NativeMutex::new()?;
        let wait_sem = S::new(false, 0)?;
        let wait_done = S::new(false, 0)?;

        debug!("generic condition created");
        Ok(Self {
            lock,
            waiting: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
            wait_sem,
            wait_done,
        })
    }

    fn wait(&self, mutex: &Mutex) -> SalResult<()> {
        self.wait_on(mutex)
    }

    fn timed_wait(&self, mutex: &Mutex, timeout: Duration) -> SalResult<WaitTimeoutResult> {
        self.timed_wait_on(mutex, Some(timeout))
    }

    fn signal(&self) -> SalResult<()> {
        let (released, posted) = self.locked(|| {
            if self.waiting.load(Ordering::Relaxed) <= self.signals.load(Ordering::Relaxed) {
                return Ok((0, Ok(())));
            }
            self.signals.fetch_add(1, Ordering::Relaxed);
            Ok(self.release(1))
        })?;

        let acked = self.collect(released);
        posted.and(acked)
    }

    fn broadcast(&self) -> SalResult<()> {
        let (released, posted) = self.locked(|| {
            let waiting = self.waiting.load(Ordering::Relaxed);
            let pending = waiting.saturating_sub(self.signals.load(Ordering::Relaxed));
            if pending == 0 {
                return Ok((0, Ok(())));
            }
            self.signals.store(waiting, Ordering::Relaxed);
            Ok(self.release(pending))
        })?;

        let acked = self.collect(released);
        posted.and(acked)
    }

    fn destroy(self) -> SalResult<()> {
        let Self {
            lock,
            waiting,
            wait_sem,
            wait_done,
            ..
        } = self;

        let waiting = waiting.into_inner();
        if waiting > 0 {
            warn!(waiting, "destroying generic condition with parked waiters");
        }

        let done_destroyed = wait_done.destroy();
        let sem_destroyed = wait_sem.destroy();
        let lock_destroyed = lock.destroy();

        debug!("generic condition destroyed");
        done_destroyed.and(sem_destroyed).and(lock_destroyed)
    }
}

impl<S: RawSemaphore + fmt::Debug> fmt::Debug for GenericCondition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCondition")
            .field("waiting", &self.waiting.load(Ordering::Relaxed))
            .field("signals", &self.signals.load(Ordering::Relaxed))
            .field("wait_sem", &self.wait_sem)
            .field("wait_done", &self.wait_done)
            .finish_non_exhaustive()
    }
}
