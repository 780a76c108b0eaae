//! File-based progression storage.
//!
//! The snapshot is one pretty-printed JSON file. Writes go to a dot-prefixed
//! temp file first and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{quest_home, STATE_FILE_NAME};
use crate::core::ProgressState;
use crate::error::{QuestError, Result};
use crate::storage::StateStore;

/// File-based state storage.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    /// Path of the state document.
    path: PathBuf,
}

impl FileStateStore {
    /// Store at `~/.codequest/game-state.json` or `$CODEQUEST_HOME/game-state.json`.
    pub fn new() -> Result<Self> {
        let home = quest_home().ok_or_else(|| {
            QuestError::config("Could not determine state directory (no home directory)")
        })?;
        Self::with_dir(home)
    }

    /// Store in a custom directory, creating it if needed.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| QuestError::storage(&dir, e))?;
        }

        Ok(Self {
            path: dir.join(STATE_FILE_NAME),
        })
    }

    /// Path of the state document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_file_name(format!(".{}.tmp", STATE_FILE_NAME))
    }

    fn atomic_write(&self, state: &ProgressState) -> Result<()> {
        let temp_path = self.temp_path();
        let json = serde_json::to_string_pretty(state)?;

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| QuestError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| QuestError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| QuestError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| QuestError::storage(&self.path, e))?;

        tracing::trace!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| QuestError::storage(&self.path, e))?;
        let value: Value = serde_json::from_str(&content)?;

        Ok(Some(value))
    }

    fn save(&self, state: &ProgressState) -> Result<()> {
        self.atomic_write(state)
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| QuestError::storage(&self.path, e))?;
        }

        let temp_path = self.temp_path();
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }
}
