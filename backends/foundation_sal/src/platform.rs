//! Build-time choice between native and generic primitives.
//!
//! | alias         | native when                                          |
//! |---------------|------------------------------------------------------|
//! | [`Semaphore`] | Linux or Android, `generic_semaphore` off            |
//! | [`Mutex`]     | `generic_mutex` off                                  |
//! | [`Condition`] | `generic_condition` and `generic_mutex` both off     |
//!
//! A native condition can only wait on a native mutex, so forcing the
//! generic mutex forces the generic condition too.

use derive_more::Display;

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "generic_semaphore")
))]
pub type Semaphore = crate::native::NativeSemaphore;

#[cfg(not(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "generic_semaphore")
)))]
pub type Semaphore = crate::generic::GenericSemaphore;

#[cfg(not(feature = "generic_mutex"))]
pub type Mutex = crate::native::NativeMutex;

#[cfg(feature = "generic_mutex")]
pub type Mutex = crate::generic::GenericMutex<Semaphore>;

#[cfg(not(any(feature = "generic_condition", feature = "generic_mutex")))]
pub type Condition = crate::native::NativeCondition;

#[cfg(any(feature = "generic_condition", feature = "generic_mutex"))]
pub type Condition = crate::generic::GenericCondition<Semaphore>;

/// Which implementation backs a platform alias.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Generic,
}

/// The backends selected for this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backends {
    pub semaphore: Backend,
    pub mutex: Backend,
    pub condition: Backend,
}

const fn pick(native: bool) -> Backend {
    if native {
        Backend::Native
    } else {
        Backend::Generic
    }
}

/// Reports the build-time selection, for diagnostics.
#[must_use]
pub const fn backends() -> Backends {
    Backends {
        semaphore: pick(cfg!(all(
            any(target_os = "linux", target_os = "android"),
            not(feature = "generic_semaphore")
        ))),
        mutex: pick(!cfg!(feature = "generic_mutex")),
        condition: pick(!cfg!(any(
            feature = "generic_condition",
            feature = "generic_mutex"
        ))),
    }
}
