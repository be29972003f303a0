use derive_more::Display;

use std::{error, io};

pub type SalResult<T> = std::result::Result<T, SalError>;

/// Failures reported by every primitive in this crate.
///
/// Native errno values are translated through [`SalError::from_errno`];
/// anything without a dedicated variant is carried as [`SalError::Os`].
#[derive(Display, Debug)]
pub enum SalError {
    /// A parameter was out of range (negative initial count, value above
    /// the host's semaphore maximum...).
    #[display("invalid argument")]
    InvalidArgument,

    /// Heap storage for a primitive could not be obtained.
    #[display("allocation failed")]
    Allocation,

    /// Posting would push a semaphore count past its maximum.
    #[display("semaphore count overflow")]
    Overflow,

    /// A bounded wait expired before the awaited condition held.
    #[display("wait timed out")]
    TimedOut,

    /// A non-blocking attempt found nothing available.
    #[display("operation would block")]
    WouldBlock,

    /// The calling thread tried to unlock a mutex it does not hold.
    #[display("mutex not held by the calling thread")]
    NotOwner,

    /// The calling thread tried to lock a mutex it already holds.
    #[display("mutex already held by the calling thread")]
    Deadlock,

    /// A primitive was destroyed while still in use.
    #[display("primitive still in use")]
    Busy,

    #[display("native primitive failed: {_0}")]
    Os(io::Error),
}

impl SalError {
    /// Maps an errno value returned by a native primitive.
    #[must_use]
    pub fn from_errno(code: i32) -> Self {
        match code {
            libc::EINVAL => Self::InvalidArgument,
            libc::ENOMEM => Self::Allocation,
            libc::EOVERFLOW => Self::Overflow,
            libc::ETIMEDOUT => Self::TimedOut,
            libc::EAGAIN => Self::WouldBlock,
            libc::EPERM => Self::NotOwner,
            libc::EDEADLK => Self::Deadlock,
            libc::EBUSY => Self::Busy,
            other => Self::Os(io::Error::from_raw_os_error(other)),
        }
    }

    /// Reads errno after a libc call that reports failure through `-1`.
    #[must_use]
    pub fn last_os_error() -> Self {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) => Self::from_errno(code),
            None => Self::Os(err),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

/// Turns a pthread-style return code (0 or an errno value) into a result.
pub(crate) fn check_code(code: i32) -> SalResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(SalError::from_errno(code))
    }
}

/// Keeps the first error when a body and its cleanup can both fail.
pub(crate) fn first_error<R>(body: SalResult<R>, cleanup: SalResult<()>) -> SalResult<R> {
    match (body, cleanup) {
        (Err(err), _) | (Ok(_), Err(err)) => Err(err),
        (Ok(value), Ok(())) => Ok(value),
    }
}

impl Eq for SalError {}

impl PartialEq for SalError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Os(m1), Self::Os(m2)) => m1.kind() == m2.kind(),
            (Self::InvalidArgument, Self::InvalidArgument)
            | (Self::Allocation, Self::Allocation)
            | (Self::Overflow, Self::Overflow)
            | (Self::TimedOut, Self::TimedOut)
            | (Self::WouldBlock, Self::WouldBlock)
            | (Self::NotOwner, Self::NotOwner)
            | (Self::Deadlock, Self::Deadlock)
            | (Self::Busy, Self::Busy) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for SalError {
    fn from(value: io::Error) -> Self {
        match value.raw_os_error() {
            Some(code) => Self::from_errno(code),
            None => Self::Os(value),
        }
    }
}

impl error::Error for SalError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Os(err) => Some(err),
            _ => None,
        }
    }
}
