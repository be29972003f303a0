use core::fmt;
use core::sync::atomic::{AtomicI32, Ordering};
use core::time::Duration;

use sal_logs::{debug, warn};

use crate::errors::{first_error, SalError, SalResult};
use crate::native::{NativeCondition, NativeMutex};
use crate::traits::{RawCondition, RawMutex, RawSemaphore};

/// A counting semaphore built from a native mutex and condition variable.
///
/// `count` is only touched while `lock` is held; the atomic exists so the
/// handle stays `Sync` without an `UnsafeCell`.
pub struct GenericSemaphore {
    lock: NativeMutex,
    cond: NativeCondition,
    count: AtomicI32,
}

impl GenericSemaphore {
    /// Always `false`: this semaphore lives in process memory only, whatever
    /// was asked for at construction.
    #[must_use]
    pub fn is_process_shared(&self) -> bool {
        false
    }

    /// Runs `body` with `lock` held, releasing it on every path.
    fn locked<R>(&self, body: impl FnOnce() -> SalResult<R>) -> SalResult<R> {
        self.lock.lock()?;
        let result = body();
        first_error(result, self.lock.unlock())
    }

    fn take_unit(&self) -> bool {
        if self.count.load(Ordering::Relaxed) > 0 {
            self.count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }
}

impl RawSemaphore for GenericSemaphore {
    fn new(shared: bool, value: i32) -> SalResult<Self> {
        if value < 0 {
            return Err(SalError::InvalidArgument);
        }
        if shared {
            warn!("generic semaphore is process-local, ignoring the shared flag");
        }

        let lock = NativeMutex::new()?;
        let cond = NativeCondition::new()?;

        debug!("generic semaphore created with value {}", value);
        Ok(Self {
            lock,
            cond,
            count: AtomicI32::new(value),
        })
    }

    fn wait(&self) -> SalResult<()> {
        self.locked(|| {
            while !self.take_unit() {
                self.cond.wait(&self.lock)?;
            }
            Ok(())
        })
    }

    fn try_wait(&self) -> SalResult<()> {
        self.lock.try_lock()?;
        let result = if self.take_unit() {
            Ok(())
        } else {
            Err(SalError::WouldBlock)
        };
        first_error(result, self.lock.unlock())
    }

    fn timed_wait(&self, timeout: Duration) -> SalResult<()> {
        let deadline = self.cond.deadline_after(timeout)?;

        self.locked(|| loop {
            if self.take_unit() {
                return Ok(());
            }
            if self.cond.wait_until(&self.lock, &deadline)?.timed_out() {
                // a unit posted right at the deadline still counts
                return if self.take_unit() {
                    Ok(())
                } else {
                    Err(SalError::TimedOut)
                };
            }
        })
    }

    fn post(&self) -> SalResult<()> {
        self.locked(|| {
            if self.count.load(Ordering::Relaxed) == i32::MAX {
                return Err(SalError::Overflow);
            }
            self.count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })?;

        self.cond.signal()
    }

    fn value(&self) -> SalResult<i32> {
        self.locked(|| Ok(self.count.load(Ordering::Relaxed)))
    }

    fn destroy(self) -> SalResult<()> {
        let Self { lock, cond, .. } = self;

        let woken = cond.broadcast();
        let cond_destroyed = cond.destroy();
        let lock_destroyed = lock.destroy();

        debug!("generic semaphore destroyed");
        woken.and(cond_destroyed).and(lock_destroyed)
    }
}

impl fmt::Debug for GenericSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericSemaphore")
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
