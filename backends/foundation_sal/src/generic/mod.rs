//! Fallbacks assembled from simpler primitives, for hosts that lack a
//! native version or when a `generic_*` feature forces them.

mod condition;
mod mutex;
mod semaphore;

pub use condition::{ConditionState, GenericCondition};
pub use mutex::GenericMutex;
pub use semaphore::GenericSemaphore;
