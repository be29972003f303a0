//! Owned handles over the host's POSIX primitives.
//!
//! Every handle keeps its pthread object boxed so the object never moves
//! after initialisation, and tears it down either through `destroy` (which
//! reports failures) or on drop (which logs them).

mod condition;
mod mutex;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod semaphore;

pub use condition::NativeCondition;
pub use mutex::NativeMutex;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use semaphore::NativeSemaphore;
