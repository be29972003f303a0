//! Relative timeout to absolute deadline conversion for the native
//! timed waits, which all take an absolute `timespec`.

use core::fmt;
use core::time::Duration;

use crate::errors::{SalError, SalResult};

const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

/// An absolute point in time on a specific host clock.
#[derive(Clone, Copy)]
pub(crate) struct Deadline {
    clock: libc::clockid_t,
    at: libc::timespec,
}

impl Deadline {
    /// Reads `clock` and adds `timeout`, saturating at the clock's maximum.
    pub(crate) fn after(clock: libc::clockid_t, timeout: Duration) -> SalResult<Self> {
        let now = now(clock)?;
        let secs = libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX);

        #[allow(clippy::cast_lossless, clippy::cast_possible_wrap)]
        let extra_nanos = timeout.subsec_nanos() as libc::c_long;

        let mut at = libc::timespec {
            tv_sec: now.tv_sec.saturating_add(secs),
            tv_nsec: now.tv_nsec + extra_nanos,
        };
        if at.tv_nsec >= NANOS_PER_SEC {
            at.tv_sec = at.tv_sec.saturating_add(1);
            at.tv_nsec -= NANOS_PER_SEC;
        }

        Ok(Self { clock, at })
    }

    pub(crate) fn as_timespec(&self) -> &libc::timespec {
        &self.at
    }

    pub(crate) fn has_passed(&self) -> SalResult<bool> {
        let now = now(self.clock)?;
        Ok((now.tv_sec, now.tv_nsec) >= (self.at.tv_sec, self.at.tv_nsec))
    }
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deadline")
            .field("clock", &self.clock)
            .field("tv_sec", &self.at.tv_sec)
            .field("tv_nsec", &self.at.tv_nsec)
            .finish()
    }
}

fn now(clock: libc::clockid_t) -> SalResult<libc::timespec> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: `ts` is a valid, writable timespec.
    let res = unsafe { libc::clock_gettime(clock, &mut ts) };
    if res == 0 {
        Ok(ts)
    } else {
        Err(SalError::last_os_error())
    }
}
