//! Fault barriers around user callbacks.
//!
//! Every closure handed to this crate (operations, choosers, mappers, event
//! choosers, sequence iterators) runs inside one of these wrappers. A panic is
//! caught at the call site and becomes an [`ErrorKind::Panicked`] value
//! instead of unwinding through combinator bookkeeping or killing the thread
//! that happened to deliver a completion.
//!
//! [`ErrorKind::Panicked`]: crate::ErrorKind::Panicked

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{Error, Result};

/// Run `f`, converting a panic into an error.
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T> {
    // Callbacks only touch state behind the crate's own gates and locks, and
    // those never expose a half-updated value to the next caller.
    catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic)
}

/// Run a fallible `f`, converting a panic into an error.
pub fn catch_flatten<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch(f).and_then(|res| res)
}
