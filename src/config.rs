//! Configuration loading for CodeQuest.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. User config (`~/.codequest/config.toml`)
//! 3. Defaults (lowest priority)
//!
//! All configuration is optional. The game runs with the standard rules
//! (five hearts, freeze streak on missed days) when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QuestError, Result};

/// Main configuration struct for CodeQuest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Game rules for hearts, feedback and streaks.
    pub progression: ProgressionConfig,
    /// Chat assistant settings.
    pub chat: ChatConfig,
}

/// Game rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Heart capacity; also the value of a daily or manual refill.
    pub max_hearts: u32,
    /// After a wrong answer, the hearts-depleted prompt is shown when the
    /// remaining hearts are at or below this value.
    pub low_hearts_threshold: u32,
    /// How long answer feedback stays on screen before the session moves on.
    pub feedback_delay_ms: u64,
    /// What happens to the streak when a calendar day is skipped:
    /// "freeze" or "reset".
    pub missed_day_policy: String,
}

/// Valid values for the missed-day policy field.
pub const VALID_MISSED_DAY_POLICIES: &[&str] = &["freeze", "reset"];

/// Minimum valid heart capacity.
pub const MIN_MAX_HEARTS: u32 = 1;

impl ProgressionConfig {
    /// Check if a missed-day policy value is valid.
    pub fn is_valid_missed_day_policy(value: &str) -> bool {
        VALID_MISSED_DAY_POLICIES.contains(&value)
    }

    /// Check if a heart capacity is valid (must be >= 1).
    pub fn is_valid_max_hearts(value: u32) -> bool {
        value >= MIN_MAX_HEARTS
    }

    /// Whether a skipped calendar day resets the streak.
    pub fn resets_streak_on_missed_day(&self) -> bool {
        self.missed_day_policy == "reset"
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_hearts: 5,
            low_hearts_threshold: 1,
            feedback_delay_ms: 1500,
            missed_day_policy: "freeze".to_string(),
        }
    }
}

/// Chat assistant settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Endpoint of the tutor service. Empty disables the assistant.
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    /// Minimum time between two sends.
    pub cooldown_ms: u64,
    /// Limit for establishing the connection.
    pub connect_timeout_ms: u64,
    /// Limit for a whole exchange, streamed reply included. 0 means none.
    pub timeout_ms: u64,
}

impl ChatConfig {
    /// Whether an endpoint has been configured.
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// Read the bearer token from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "CODEQUEST_CHAT_KEY".to_string(),
            cooldown_ms: 1500,
            connect_timeout_ms: 10_000,
            timeout_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match quest_home() {
            Some(home) => Self::load_from_home(&home),
            None => {
                let mut config = Config::default();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration from a specific home directory.
    pub fn load_from_home(home: &Path) -> Self {
        let mut config = Config::default();

        let config_path = home.join("config.toml");
        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(user_config) => config = config.merge(user_config),
                Err(e) => tracing::warn!("ignoring {}: {}", config_path.display(), e),
            }
        }

        config.apply_env_overrides();
        config
    }

    /// Load config from a specific file path.
    fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| QuestError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| QuestError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // CODEQUEST_MAX_HEARTS
        if let Ok(val) = env::var("CODEQUEST_MAX_HEARTS") {
            match val.parse::<u32>() {
                Ok(n) if ProgressionConfig::is_valid_max_hearts(n) => {
                    self.progression.max_hearts = n;
                }
                _ => eprintln!(
                    "Warning: Invalid CODEQUEST_MAX_HEARTS value '{}'. \
                    Must be an integer >= {}. Using '{}'.",
                    val, MIN_MAX_HEARTS, self.progression.max_hearts
                ),
            }
        }

        // CODEQUEST_FEEDBACK_DELAY_MS
        if let Ok(val) = env::var("CODEQUEST_FEEDBACK_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(n) => self.progression.feedback_delay_ms = n,
                Err(_) => eprintln!(
                    "Warning: Invalid CODEQUEST_FEEDBACK_DELAY_MS value '{}'. \
                    Expected milliseconds. Using '{}'.",
                    val, self.progression.feedback_delay_ms
                ),
            }
        }

        // CODEQUEST_MISSED_DAY_POLICY
        if let Ok(val) = env::var("CODEQUEST_MISSED_DAY_POLICY") {
            if ProgressionConfig::is_valid_missed_day_policy(&val) {
                self.progression.missed_day_policy = val;
            } else {
                eprintln!(
                    "Warning: Invalid CODEQUEST_MISSED_DAY_POLICY value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val, VALID_MISSED_DAY_POLICIES, self.progression.missed_day_policy
                );
            }
        }

        // CODEQUEST_CHAT_ENDPOINT
        if let Ok(val) = env::var("CODEQUEST_CHAT_ENDPOINT") {
            self.chat.endpoint = val;
        }
    }

    /// Merge a file config over this one.
    ///
    /// Field by field: a value equal to the default does not override. Invalid
    /// values are reported and skipped.
    fn merge(mut self, other: Config) -> Self {
        let default_progression = ProgressionConfig::default();
        if other.progression.max_hearts != default_progression.max_hearts {
            if ProgressionConfig::is_valid_max_hearts(other.progression.max_hearts) {
                self.progression.max_hearts = other.progression.max_hearts;
            } else {
                tracing::warn!(
                    value = other.progression.max_hearts,
                    "invalid progression.max_hearts, keeping {}",
                    self.progression.max_hearts
                );
            }
        }
        if other.progression.low_hearts_threshold != default_progression.low_hearts_threshold {
            self.progression.low_hearts_threshold = other.progression.low_hearts_threshold;
        }
        if other.progression.feedback_delay_ms != default_progression.feedback_delay_ms {
            self.progression.feedback_delay_ms = other.progression.feedback_delay_ms;
        }
        if other.progression.missed_day_policy != default_progression.missed_day_policy {
            if ProgressionConfig::is_valid_missed_day_policy(&other.progression.missed_day_policy)
            {
                self.progression.missed_day_policy = other.progression.missed_day_policy;
            } else {
                tracing::warn!(
                    value = %other.progression.missed_day_policy,
                    "invalid progression.missed_day_policy, keeping {}",
                    self.progression.missed_day_policy
                );
            }
        }

        let default_chat = ChatConfig::default();
        if other.chat.endpoint != default_chat.endpoint {
            self.chat.endpoint = other.chat.endpoint;
        }
        if other.chat.api_key_env != default_chat.api_key_env {
            self.chat.api_key_env = other.chat.api_key_env;
        }
        if other.chat.cooldown_ms != default_chat.cooldown_ms {
            self.chat.cooldown_ms = other.chat.cooldown_ms;
        }
        if other.chat.connect_timeout_ms != default_chat.connect_timeout_ms {
            self.chat.connect_timeout_ms = other.chat.connect_timeout_ms;
        }
        if other.chat.timeout_ms != default_chat.timeout_ms {
            self.chat.timeout_ms = other.chat.timeout_ms;
        }

        self
    }
}

/// Get the CodeQuest home directory.
///
/// Checks `CODEQUEST_HOME` first, then falls back to `~/.codequest`.
/// An empty `CODEQUEST_HOME` is ignored.
pub fn quest_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("CODEQUEST_HOME") {
        if home.is_empty() {
            tracing::warn!("CODEQUEST_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("CODEQUEST_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".codequest"));
    }

    let fallback = env::temp_dir().join("codequest");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Name of the single state slot.
pub const STATE_FILE_NAME: &str = "game-state.json";

/// Get the persisted game state path.
///
/// Returns `<quest_home>/game-state.json`.
pub fn state_path() -> Option<PathBuf> {
    quest_home().map(|h| h.join(STATE_FILE_NAME))
}
