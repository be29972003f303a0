use core::cell::UnsafeCell;
use core::fmt;
use core::mem::{self, MaybeUninit};

use sal_logs::{debug, error};

use crate::errors::{check_code, SalError, SalResult};
use crate::heap::try_box;
use crate::traits::RawMutex;

/// An error-checking pthread mutex.
///
/// Relocking from the owning thread fails with [`SalError::Deadlock`] and
/// unlocking from any other thread fails with [`SalError::NotOwner`].
pub struct NativeMutex {
    raw: Box<UnsafeCell<libc::pthread_mutex_t>>,
    live: bool,
}

// SAFETY: pthread mutexes are designed to be shared between threads; the
// boxed storage never moves while the handle is alive.
unsafe impl Send for NativeMutex {}
unsafe impl Sync for NativeMutex {}

impl NativeMutex {
    pub(crate) fn as_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.raw.get()
    }

    fn teardown(&mut self) -> SalResult<()> {
        if !mem::replace(&mut self.live, false) {
            return Ok(());
        }

        // SAFETY: the mutex was initialised in `new` and is destroyed once.
        check_code(unsafe { libc::pthread_mutex_destroy(self.as_ptr()) })
    }
}

impl RawMutex for NativeMutex {
    fn new() -> SalResult<Self> {
        let raw = try_box(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER))?;
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();

        // SAFETY: `attr` is initialised by `pthread_mutexattr_init` before any
        // other use and destroyed before leaving the block.
        unsafe {
            check_code(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
            let initialised = check_code(libc::pthread_mutexattr_settype(
                attr.as_mut_ptr(),
                libc::PTHREAD_MUTEX_ERRORCHECK,
            ))
            .and_then(|()| check_code(libc::pthread_mutex_init(raw.get(), attr.as_ptr())));
            if let Err(err) = check_code(libc::pthread_mutexattr_destroy(attr.as_mut_ptr())) {
                error!("failed to tear down native mutex attributes: {}", err);
            }
            initialised?;
        }

        debug!("native mutex created");
        Ok(Self { raw, live: true })
    }

    fn lock(&self) -> SalResult<()> {
        // SAFETY: `raw` holds an initialised mutex for the handle's lifetime.
        check_code(unsafe { libc::pthread_mutex_lock(self.as_ptr()) })
    }

    fn try_lock(&self) -> SalResult<()> {
        // SAFETY: see `lock`.
        match unsafe { libc::pthread_mutex_trylock(self.as_ptr()) } {
            0 => Ok(()),
            libc::EBUSY => Err(SalError::WouldBlock),
            code => Err(SalError::from_errno(code)),
        }
    }

    fn unlock(&self) -> SalResult<()> {
        // SAFETY: see `lock`; error checking reports a non-owner unlock.
        check_code(unsafe { libc::pthread_mutex_unlock(self.as_ptr()) })
    }

    fn destroy(mut self) -> SalResult<()> {
        self.teardown()
    }
}

impl Drop for NativeMutex {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!("failed to tear down native mutex: {}", err);
        }
    }
}

impl fmt::Debug for NativeMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMutex")
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
