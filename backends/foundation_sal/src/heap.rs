//! Fallible heap placement for native primitive storage.
//!
//! pthread objects must keep a stable address once initialised, so each
//! native handle keeps its storage boxed. `Box::new` aborts the process on
//! allocation failure; [`try_box`] reports it as [`SalError::Allocation`]
//! instead.

use std::alloc::{self, Layout};

use crate::errors::{SalError, SalResult};

pub(crate) fn try_box<T>(value: T) -> SalResult<Box<T>> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }

    // SAFETY: `layout` has a non-zero size.
    let ptr = unsafe { alloc::alloc(layout) }.cast::<T>();
    if ptr.is_null() {
        return Err(SalError::Allocation);
    }

    // SAFETY: `ptr` is non-null, aligned for `T` and was allocated by the
    // global allocator with `Layout::new::<T>()`, which is what `Box` expects.
    unsafe {
        ptr.write(value);
        Ok(Box::from_raw(ptr))
    }
}
