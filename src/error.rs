//! Unified error types for CodeQuest.
//!
//! The progression engine itself is total: every mutation is defined for
//! every reachable input. Errors only arise at the edges (storage, config,
//! catalog data, invalid quiz transitions, the chat collaborator). Storage
//! and config failures never stop the learner; they are logged and replaced
//! with safe defaults through [`FailOpen`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for CodeQuest operations.
#[derive(Error, Debug)]
pub enum QuestError {
    /// I/O errors from state file operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Course catalog data that violates catalog invariants.
    #[error("catalog error: {message}")]
    Catalog { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Quiz session transition not allowed in the current phase.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Unknown level, lesson or question identifier.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Chat assistant failures (network, HTTP status, cooldown).
    #[error("chat error: {message}")]
    Chat { message: String },
}

/// A specialized Result type for CodeQuest operations.
pub type Result<T> = std::result::Result<T, QuestError>;

impl QuestError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a chat error.
    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
        }
    }

    /// Whether the learner can keep playing after this error.
    ///
    /// Storage and config problems degrade to defaults. Everything else
    /// is reported to the caller.
    pub fn is_fail_open(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Serde { .. } | Self::Config { .. }
        )
    }
}

impl From<io::Error> for QuestError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for QuestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for QuestError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Log the error and substitute a safe default instead of propagating.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the CodeQuest CLI.
pub mod exit_codes {
    /// Command completed.
    pub const SUCCESS: i32 = 0;

    /// Command ran but could not do what was asked (locked lesson, cooldown...).
    pub const FAILURE: i32 = 1;

    /// Command line or configuration problem.
    pub const USAGE: i32 = 2;

    /// Panic; details go to `crash.log` in the CodeQuest home.
    pub const CRASH: i32 = 3;
}
