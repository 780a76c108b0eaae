//! Language command for CodeQuest.
//!
//! Shows or switches the learner's track. Switching restarts progression
//! at level 1 of the new course; XP, hearts, streak and badges carry over.

use serde::Serialize;

use crate::catalog::Language;
use crate::cli::{render, OutputOptions};
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the language command.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageOutput {
    pub success: bool,
    /// Active track after the command.
    pub language: String,
    /// Whether the track actually changed.
    pub switched: bool,
    pub available: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The language command implementation.
pub struct LanguageCommand<'a, S: StateStore> {
    game: &'a mut GameStore<S>,
}

impl<'a, S: StateStore> LanguageCommand<'a, S> {
    pub fn new(game: &'a mut GameStore<S>) -> Self {
        Self { game }
    }

    /// Switch to `choice`, or just report the current track when `None`.
    pub fn run(&mut self, choice: Option<&str>) -> LanguageOutput {
        let available = Language::ALL.iter().map(|l| l.as_str().to_string()).collect();

        let Some(choice) = choice else {
            return self.output(false, available, None);
        };

        let language = match choice.parse::<Language>() {
            Ok(language) => language,
            Err(_) => {
                let error = format!("Unknown language '{}'", choice);
                return self.output(false, available, Some(error));
            }
        };

        let switched = self.game.state().preferred_language != Some(language);
        if switched {
            self.game.set_preferred_language(language);
        }
        self.output(switched, available, None)
    }

    fn output(&self, switched: bool, available: Vec<String>, error: Option<String>) -> LanguageOutput {
        LanguageOutput {
            success: error.is_none(),
            language: self.game.course().language.as_str().to_string(),
            switched,
            available,
            error,
        }
    }

    pub fn format_output(&self, output: &LanguageOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &LanguageOutput) -> String {
        if let Some(error) = &output.error {
            return format!(
                "{}. Available: {}\n",
                error,
                output.available.join(", ")
            );
        }
        if output.switched {
            format!(
                "Track switched to {}. Progress restarts at level 1.\n",
                output.language
            )
        } else {
            format!(
                "Current track: {} (available: {})\n",
                output.language,
                output.available.join(", ")
            )
        }
    }
}
