//! Crate to abstract out tracing so it never shows up in release builds using macros
//! See similar: https://doc.rust-lang.org/src/std/macros.rs.html#138-145.
//!
//! The `cfg!` checks expand inside the calling crate, so each caller decides
//! which levels are live through its own `log_*` features.

#[doc(hidden)]
pub use tracing;

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        if cfg!(feature="log_info") {
            $crate::tracing::info!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        if cfg!(feature="log_warnings") {
            $crate::tracing::warn!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        if cfg!(feature="log_debug") {
            $crate::tracing::debug!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        if cfg!(feature="log_errors") {
            $crate::tracing::error!($($t)*);
        }
    };
}
