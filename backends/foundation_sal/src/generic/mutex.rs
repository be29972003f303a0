use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use sal_logs::debug;

use crate::errors::{SalError, SalResult};
use crate::platform::Semaphore;
use crate::traits::{RawMutex, RawSemaphore};

const NO_OWNER: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique, never zero token of the calling thread.
fn current_thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// A mutex built from a semaphore holding one unit plus an owner token.
///
/// Ownership errors mirror the error-checking native mutex: relocking fails
/// with [`SalError::Deadlock`], unlocking from a non-owner with
/// [`SalError::NotOwner`].
pub struct GenericMutex<S: RawSemaphore = Semaphore> {
    sem: S,
    owner: AtomicU64,
}

impl<S: RawSemaphore> GenericMutex<S> {
    /// Whether the calling thread holds the mutex.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread_token()
    }
}

impl<S: RawSemaphore> RawMutex for GenericMutex<S> {
    fn new() -> SalResult<Self> {
        let sem = S::new(false, 1)?;

        debug!("generic mutex created");
        Ok(Self {
            sem,
            owner: AtomicU64::new(NO_OWNER),
        })
    }

    fn lock(&self) -> SalResult<()> {
        if self.is_held_by_current_thread() {
            return Err(SalError::Deadlock);
        }

        self.sem.wait()?;
        self.owner.store(current_thread_token(), Ordering::Release);
        Ok(())
    }

    /// Acquires the mutex only if no thread holds it.
    ///
    /// A semaphore's `try_wait` may fail fast while its own bookkeeping lock
    /// is briefly held by another thread. The unit count is rechecked then,
    /// so a free mutex is never reported as held.
    fn try_lock(&self) -> SalResult<()> {
        if self.is_held_by_current_thread() {
            return Err(SalError::WouldBlock);
        }

        loop {
            match self.sem.try_wait() {
                Ok(()) => break,
                Err(SalError::WouldBlock) if self.sem.value()? > 0 => {}
                Err(err) => return Err(err),
            }
        }

        self.owner.store(current_thread_token(), Ordering::Release);
        Ok(())
    }

    fn unlock(&self) -> SalResult<()> {
        if !self.is_held_by_current_thread() {
            return Err(SalError::NotOwner);
        }

        self.owner.store(NO_OWNER, Ordering::Release);
        self.sem.post()
    }

    fn destroy(self) -> SalResult<()> {
        if self.owner.load(Ordering::Acquire) != NO_OWNER {
            return Err(SalError::Busy);
        }
        self.sem.destroy()
    }
}

impl<S: RawSemaphore + fmt::Debug> fmt::Debug for GenericMutex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericMutex")
            .field("owner", &self.owner.load(Ordering::Relaxed))
            .field("sem", &self.sem)
            .finish()
    }
}
