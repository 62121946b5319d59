//! Process-wide accessor for application wiring.
//!
//! Libraries should take an [`IdSource`] (or a [`Generator`]) as a parameter.
//! This module exists for the outermost layer of an application that wants a
//! `snowlease::next_id()` call site without threading the generator through.
//!
//! [`Generator`]: crate::Generator

use std::sync::{Arc, PoisonError, RwLock};

use crate::{Error, IdSource, Result};

static GLOBAL: RwLock<Option<Arc<dyn IdSource>>> = RwLock::new(None);

/// Installs `source` as the process-wide generator and returns the one it
/// replaced.
pub fn install_global(source: Arc<dyn IdSource>) -> Option<Arc<dyn IdSource>> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(source)
}

/// Removes the process-wide generator.
pub fn take_global() -> Option<Arc<dyn IdSource>> {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).take()
}

/// The currently installed process-wide generator.
pub fn global() -> Option<Arc<dyn IdSource>> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Draws the next raw ID from the process-wide generator.
///
/// # Errors
///
/// [`Error::NotRunning`] if nothing is installed, otherwise whatever the
/// installed source returns.
pub fn next_id() -> Result<u64> {
    global().ok_or(Error::NotRunning)?.next_raw_id()
}
