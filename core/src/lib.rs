//! # uascout core
//!
//! The discovery engine:
//!
//! * **[`probe`]**: probe units that connect to candidate endpoints and interrogate them.
//! * **[`scanner`]**: the staged pipeline turning address and port ranges into endpoints.
//! * **[`discovery`]**: the coordinator running periodic sweeps and publishing their results.
//! * **[`cache`]**: recent sweep results kept for inspection.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod cache;
pub mod discovery;
pub mod probe;
pub mod scanner;

/// Locks `mutex`, taking over the data of a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
