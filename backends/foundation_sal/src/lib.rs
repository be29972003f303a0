//! Portable synchronization primitives.
//!
//! Each primitive comes in a native flavour wrapping the host's POSIX
//! object and a generic flavour built from simpler primitives:
//!
//! - [`GenericSemaphore`]: native mutex, native condition and a counter.
//! - [`GenericCondition`]: native mutex, two counters and two semaphores.
//! - [`GenericMutex`]: a semaphore holding one unit and an owner token.
//!
//! [`Semaphore`], [`Mutex`] and [`Condition`] name whichever flavour this
//! build selected (see [`platform`]). Handles are owned: create them with
//! `new`, share them by reference or `Arc`, and tear them down with
//! `destroy` to observe teardown errors. Dropping a handle tears it down
//! too, logging any failure.
//!
//! ```no_run
//! use foundation_sal::{Condition, Mutex, RawCondition, RawMutex};
//!
//! let mutex = Mutex::new()?;
//! let cond = Condition::new()?;
//!
//! mutex.lock()?;
//! let result = cond.timed_wait(&mutex, std::time::Duration::from_millis(10))?;
//! assert!(result.timed_out());
//! mutex.unlock()?;
//!
//! cond.destroy()?;
//! mutex.destroy()?;
//! # Ok::<(), foundation_sal::SalError>(())
//! ```

#[cfg(not(unix))]
compile_error!("foundation_sal needs a POSIX host");

mod errors;
mod heap;
mod time;

pub mod generic;
pub mod native;
pub mod platform;
pub mod traits;

pub use errors::{SalError, SalResult};
pub use generic::{ConditionState, GenericCondition, GenericMutex, GenericSemaphore};
pub use platform::{backends, Backend, Backends, Condition, Mutex, Semaphore};
pub use traits::{RawCondition, RawMutex, RawSemaphore, WaitTimeoutResult};
