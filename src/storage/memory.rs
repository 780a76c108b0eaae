//! In-memory state storage for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::core::ProgressState;
use crate::error::{QuestError, Result};
use crate::storage::StateStore;

/// In-memory state store.
///
/// Holds the last saved document. Writes can be made to fail to exercise
/// the fail-open paths of callers.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    document: RwLock<Option<Value>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `document`.
    pub fn with_document(document: Value) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current document, if any.
    pub fn document(&self) -> Option<Value> {
        self.document
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<Value>> {
        Ok(self.document())
    }

    fn save(&self, state: &ProgressState) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(QuestError::storage(
                "memory",
                std::io::Error::other("writes disabled"),
            ));
        }
        let value = serde_json::to_value(state)?;
        *self
            .document
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(value);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .document
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}
