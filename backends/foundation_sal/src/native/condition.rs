use core::cell::UnsafeCell;
use core::fmt;
use core::mem::{self, MaybeUninit};
use core::time::Duration;

use sal_logs::{debug, error};

use crate::errors::{check_code, SalError, SalResult};
use crate::heap::try_box;
use crate::time::Deadline;
use crate::traits::{RawCondition, WaitTimeoutResult};

use super::NativeMutex;

/// Clock the condition measures deadlines against. Monotonic where the
/// host lets a condition variable be bound to it.
#[cfg(any(target_os = "linux", target_os = "android"))]
const CONDITION_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const CONDITION_CLOCK: libc::clockid_t = libc::CLOCK_REALTIME;

/// A pthread condition variable.
///
/// Waits may wake spuriously, callers recheck their predicate.
pub struct NativeCondition {
    raw: Box<UnsafeCell<libc::pthread_cond_t>>,
    live: bool,
}

// SAFETY: pthread condition variables are designed to be shared between
// threads; the boxed storage never moves while the handle is alive.
unsafe impl Send for NativeCondition {}
unsafe impl Sync for NativeCondition {}

impl NativeCondition {
    fn as_ptr(&self) -> *mut libc::pthread_cond_t {
        self.raw.get()
    }

    /// Converts a relative timeout into a deadline on this condition's clock.
    pub(crate) fn deadline_after(&self, timeout: Duration) -> SalResult<Deadline> {
        Deadline::after(CONDITION_CLOCK, timeout)
    }

    /// Waits until signalled or until `deadline` passes.
    ///
    /// `mutex` must be held by the caller and is held again on return,
    /// whatever the outcome.
    pub(crate) fn wait_until(
        &self,
        mutex: &NativeMutex,
        deadline: &Deadline,
    ) -> SalResult<WaitTimeoutResult> {
        // SAFETY: both objects are initialised for the lifetime of their
        // handles and `deadline` points at a valid timespec.
        let code = unsafe {
            libc::pthread_cond_timedwait(self.as_ptr(), mutex.as_ptr(), deadline.as_timespec())
        };

        match code {
            0 => Ok(WaitTimeoutResult::new(false)),
            libc::ETIMEDOUT => Ok(WaitTimeoutResult::new(true)),
            code => Err(SalError::from_errno(code)),
        }
    }

    fn teardown(&mut self) -> SalResult<()> {
        if !mem::replace(&mut self.live, false) {
            return Ok(());
        }

        // SAFETY: the condition was initialised in `new` and is destroyed once.
        check_code(unsafe { libc::pthread_cond_destroy(self.as_ptr()) })
    }
}

impl RawCondition for NativeCondition {
    type Mutex = NativeMutex;

    fn new() -> SalResult<Self> {
        let raw = try_box(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER))?;
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();

        // SAFETY: `attr` is initialised by `pthread_condattr_init` before any
        // other use and destroyed before leaving the block.
        unsafe {
            check_code(libc::pthread_condattr_init(attr.as_mut_ptr()))?;

            #[cfg(any(target_os = "linux", target_os = "android"))]
            let clocked = check_code(libc::pthread_condattr_setclock(
                attr.as_mut_ptr(),
                CONDITION_CLOCK,
            ));
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            let clocked: SalResult<()> = Ok(());

            let initialised =
                clocked.and_then(|()| check_code(libc::pthread_cond_init(raw.get(), attr.as_ptr())));
            if let Err(err) = check_code(libc::pthread_condattr_destroy(attr.as_mut_ptr())) {
                error!("failed to tear down native condition attributes: {}", err);
            }
            initialised?;
        }

        debug!("native condition created");
        Ok(Self { raw, live: true })
    }

    fn wait(&self, mutex: &NativeMutex) -> SalResult<()> {
        // SAFETY: both objects are initialised for the lifetime of their handles.
        check_code(unsafe { libc::pthread_cond_wait(self.as_ptr(), mutex.as_ptr()) })
    }

    fn timed_wait(&self, mutex: &NativeMutex, timeout: Duration) -> SalResult<WaitTimeoutResult> {
        let deadline = self.deadline_after(timeout)?;
        self.wait_until(mutex, &deadline)
    }

    fn signal(&self) -> SalResult<()> {
        // SAFETY: `raw` holds an initialised condition for the handle's lifetime.
        check_code(unsafe { libc::pthread_cond_signal(self.as_ptr()) })
    }

    fn broadcast(&self) -> SalResult<()> {
        // SAFETY: see `signal`.
        check_code(unsafe { libc::pthread_cond_broadcast(self.as_ptr()) })
    }

    fn destroy(mut self) -> SalResult<()> {
        self.teardown()
    }
}

impl Drop for NativeCondition {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!("failed to tear down native condition: {}", err);
        }
    }
}

impl fmt::Debug for NativeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCondition")
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
