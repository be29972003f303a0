use core::cell::UnsafeCell;
use core::fmt;
use core::mem;
use core::time::Duration;

use sal_logs::{debug, error};

use crate::errors::{SalError, SalResult};
use crate::heap::try_box;
use crate::time::Deadline;
use crate::traits::RawSemaphore;

/// An unnamed POSIX semaphore.
pub struct NativeSemaphore {
    raw: Box<UnsafeCell<libc::sem_t>>,
    shared: bool,
    live: bool,
}

// SAFETY: POSIX semaphores are designed to be shared between threads; the
// boxed storage never moves while the handle is alive.
unsafe impl Send for NativeSemaphore {}
unsafe impl Sync for NativeSemaphore {}

/// Runs a `sem_*` call reporting failure through `-1` and errno, retrying
/// when a signal handler interrupted it.
fn retry_interrupted(mut call: impl FnMut() -> libc::c_int) -> SalResult<()> {
    loop {
        if call() == 0 {
            return Ok(());
        }

        match SalError::last_os_error() {
            SalError::Os(err) if err.raw_os_error() == Some(libc::EINTR) => {}
            err => return Err(err),
        }
    }
}

impl NativeSemaphore {
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.raw.get()
    }

    /// Whether the semaphore was created process-shared.
    #[must_use]
    pub fn is_process_shared(&self) -> bool {
        self.shared
    }

    fn teardown(&mut self) -> SalResult<()> {
        if !mem::replace(&mut self.live, false) {
            return Ok(());
        }

        // SAFETY: the semaphore was initialised in `new` and is destroyed once.
        retry_interrupted(|| unsafe { libc::sem_destroy(self.as_ptr()) })
    }
}

impl RawSemaphore for NativeSemaphore {
    fn new(shared: bool, value: i32) -> SalResult<Self> {
        let initial = libc::c_uint::try_from(value).map_err(|_| SalError::InvalidArgument)?;

        // SAFETY: an all-zero `sem_t` is plain storage; `sem_init` below
        // gives it meaning.
        let raw = try_box(UnsafeCell::new(unsafe { mem::zeroed::<libc::sem_t>() }))?;

        // SAFETY: `raw` is valid, writable and never moves afterwards.
        if unsafe { libc::sem_init(raw.get(), libc::c_int::from(shared), initial) } != 0 {
            return Err(SalError::last_os_error());
        }

        debug!("native semaphore created with value {}", value);
        Ok(Self {
            raw,
            shared,
            live: true,
        })
    }

    fn wait(&self) -> SalResult<()> {
        // SAFETY: `raw` holds an initialised semaphore for the handle's lifetime.
        retry_interrupted(|| unsafe { libc::sem_wait(self.as_ptr()) })
    }

    fn try_wait(&self) -> SalResult<()> {
        // SAFETY: see `wait`.
        retry_interrupted(|| unsafe { libc::sem_trywait(self.as_ptr()) }).map_err(|err| match err {
            SalError::Busy => SalError::WouldBlock,
            err => err,
        })
    }

    fn timed_wait(&self, timeout: Duration) -> SalResult<()> {
        // sem_timedwait always measures against the realtime clock.
        let deadline = Deadline::after(libc::CLOCK_REALTIME, timeout)?;

        // SAFETY: see `wait`; the deadline outlives every retry.
        retry_interrupted(|| unsafe { libc::sem_timedwait(self.as_ptr(), deadline.as_timespec()) })
    }

    fn post(&self) -> SalResult<()> {
        // SAFETY: see `wait`.
        retry_interrupted(|| unsafe { libc::sem_post(self.as_ptr()) })
    }

    fn value(&self) -> SalResult<i32> {
        let mut value: libc::c_int = 0;

        // SAFETY: see `wait`; `value` is a valid, writable int.
        if unsafe { libc::sem_getvalue(self.as_ptr(), &mut value) } != 0 {
            return Err(SalError::last_os_error());
        }

        // Some hosts report parked waiters as a negative count.
        Ok(value.max(0))
    }

    fn destroy(mut self) -> SalResult<()> {
        self.teardown()
    }
}

impl Drop for NativeSemaphore {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!("failed to tear down native semaphore: {}", err);
        }
    }
}

impl fmt::Debug for NativeSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSemaphore")
            .field("shared", &self.shared)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
