//! CLI commands for CodeQuest.
//!
//! - **Progress commands**: status, map, language, reset
//! - **Learning commands**: theory, play, practice
//! - **Tutor command**: ask

// Progress commands
pub mod language;
pub mod map;
pub mod reset;
pub mod status;

// Learning commands
pub mod play;
pub mod practice;
pub mod theory;

// Tutor command
pub mod ask;

pub use ask::AskCommand;
pub use language::LanguageCommand;
pub use map::MapCommand;
pub use play::PlayCommand;
pub use practice::PracticeCommand;
pub use reset::ResetCommand;
pub use status::StatusCommand;
pub use theory::TheoryCommand;

use serde::Serialize;

use crate::progress::GameStore;
use crate::storage::StateStore;

/// Shown by learning commands until a track has been chosen.
pub const NO_TRACK_MESSAGE: &str =
    "Choose a track first: run `codequest language python` or `codequest language javascript`";

/// Error for learning commands when no track has been chosen yet.
///
/// The default catalog backs `status` only; lessons are not played on it,
/// so the first choice of language never throws progress away.
pub(crate) fn track_error<S: StateStore>(game: &GameStore<S>) -> Option<String> {
    game.state()
        .preferred_language
        .is_none()
        .then(|| NO_TRACK_MESSAGE.to_string())
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Render a command result: nothing when quiet, JSON when asked, else `human`.
pub(crate) fn render<T: Serialize>(
    output: &T,
    options: &OutputOptions,
    human: impl FnOnce(&T) -> String,
) -> String {
    if options.quiet {
        return String::new();
    }
    if options.json {
        serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
    } else {
        human(output)
    }
}

/// Text bar for hearts, e.g. `♥♥♥♡♡`.
pub(crate) fn hearts_bar(hearts: u32, max_hearts: u32) -> String {
    let full = hearts.min(max_hearts) as usize;
    let empty = max_hearts.saturating_sub(hearts) as usize;
    format!("{}{}", "♥".repeat(full), "♡".repeat(empty))
}
