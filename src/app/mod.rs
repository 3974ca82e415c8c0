pub mod context;
pub mod error;
pub mod logging;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use context::SyncContext;
pub use error::{
    CoordinatorError, DecodeError, FailureReason, Result, TidingsError, TransportError,
};

/// Lock a std mutex, recovering the data if a holder panicked. Every
/// critical section in the crate leaves its data consistent before any
/// point that could panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
