//! Storage trait for the progression snapshot.

use std::sync::Arc;

use serde_json::Value;

use crate::core::ProgressState;
use crate::error::Result;

/// Trait for progression storage backends.
///
/// `load` hands back the raw persisted document so the caller can merge it
/// field by field over defaults; a partially valid document is still useful.
pub trait StateStore: Send + Sync {
    /// Read the persisted document.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Value>>;

    /// Replace the persisted document with `state`.
    fn save(&self, state: &ProgressState) -> Result<()>;

    /// Remove the persisted document.
    ///
    /// Returns `Ok(())` even if nothing was saved.
    fn clear(&self) -> Result<()>;
}

/// Lets tests keep a handle on a store that a `GameStore` owns.
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<Option<Value>> {
        (**self).load()
    }

    fn save(&self, state: &ProgressState) -> Result<()> {
        (**self).save(state)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
