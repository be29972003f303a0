//! The shared surface of every primitive, native or generic.
//!
//! The platform aliases in [`crate::platform`] pick one implementation per
//! trait at build time; code written against these traits works with
//! either.

use core::time::Duration;

use crate::errors::SalResult;

/// Result of a timed wait operation.
///
/// This type is returned by [`RawCondition::timed_wait`] and related methods
/// to indicate whether the wait timed out or was notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    /// Returns `true` if the wait timed out.
    #[inline]
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.0
    }

    #[inline]
    pub(crate) const fn new(timed_out: bool) -> Self {
        Self(timed_out)
    }
}

/// A mutual-exclusion lock with explicit lock and unlock calls.
///
/// Unlike `std::sync::Mutex` there is no guard: a condition variable
/// releases and reacquires the mutex on the caller's behalf, so ownership
/// is tracked by the primitive itself and misuse is reported as an error.
pub trait RawMutex: Sized + Send + Sync {
    /// Creates an unlocked mutex.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::Allocation`] when storage cannot be
    /// obtained, or the native error when initialisation fails.
    fn new() -> SalResult<Self>;

    /// Blocks until the calling thread holds the mutex.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::Deadlock`] when the caller already holds it.
    fn lock(&self) -> SalResult<()>;

    /// Acquires the mutex only if it is free.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::WouldBlock`] when it is held.
    fn try_lock(&self) -> SalResult<()>;

    /// Releases the mutex.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::NotOwner`] when the caller does not hold it.
    fn unlock(&self) -> SalResult<()>;

    /// Tears the mutex down, reporting failures instead of logging them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::Busy`] when the mutex is still locked.
    fn destroy(self) -> SalResult<()>;
}

/// A counting semaphore.
pub trait RawSemaphore: Sized + Send + Sync {
    /// Creates a semaphore holding `value` units.
    ///
    /// `shared` asks for a semaphore usable across processes. Only the
    /// native POSIX semaphore honours it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::InvalidArgument`] for a negative `value`.
    fn new(shared: bool, value: i32) -> SalResult<Self>;

    /// Blocks until a unit is available and takes it.
    ///
    /// # Errors
    ///
    /// Returns the underlying primitive's error.
    fn wait(&self) -> SalResult<()>;

    /// Takes a unit only if one is available right now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::WouldBlock`] when none is available.
    fn try_wait(&self) -> SalResult<()>;

    /// Like [`RawSemaphore::wait`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::TimedOut`] when no unit arrived in time;
    /// the count is left untouched.
    fn timed_wait(&self, timeout: Duration) -> SalResult<()>;

    /// Releases one unit, waking one waiter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::Overflow`] when the count is at its maximum.
    fn post(&self) -> SalResult<()>;

    /// Reads the current count. Never negative.
    ///
    /// # Errors
    ///
    /// Returns the underlying primitive's error.
    fn value(&self) -> SalResult<i32>;

    /// Tears the semaphore down.
    ///
    /// # Errors
    ///
    /// Returns the first failure met; every teardown step is still attempted.
    fn destroy(self) -> SalResult<()>;
}

/// A condition variable paired with a [`RawMutex`] type.
pub trait RawCondition: Sized + Send + Sync {
    /// The mutex type callers hold while waiting.
    type Mutex: RawMutex;

    /// Creates a condition variable with no waiters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SalError::Allocation`] or the native init error.
    fn new() -> SalResult<Self>;

    /// Releases `mutex`, blocks until signalled, then reacquires `mutex`.
    ///
    /// The caller must hold `mutex`.
    ///
    /// # Errors
    ///
    /// Returns the error of any lock or unlock on `mutex`.
    fn wait(&self, mutex: &Self::Mutex) -> SalResult<()>;

    /// Like [`RawCondition::wait`], giving up after `timeout`.
    ///
    /// `mutex` is held again on both the notified and the timed out path.
    ///
    /// # Errors
    ///
    /// Returns the error of any lock or unlock on `mutex`.
    fn timed_wait(&self, mutex: &Self::Mutex, timeout: Duration)
        -> SalResult<WaitTimeoutResult>;

    /// Wakes one waiter, if any.
    ///
    /// # Errors
    ///
    /// Returns the underlying primitive's error.
    fn signal(&self) -> SalResult<()>;

    /// Wakes every current waiter.
    ///
    /// # Errors
    ///
    /// Returns the underlying primitive's error.
    fn broadcast(&self) -> SalResult<()>;

    /// Tears the condition variable down.
    ///
    /// # Errors
    ///
    /// Returns the first failure met; every teardown step is still attempted.
    fn destroy(self) -> SalResult<()>;
}
