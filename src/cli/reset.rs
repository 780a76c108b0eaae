//! Reset command for CodeQuest.
//!
//! Wipes all progression. Requires explicit confirmation.

use serde::Serialize;

use crate::cli::{render, OutputOptions};
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the reset command.
#[derive(Debug, Clone, Serialize)]
pub struct ResetOutput {
    pub success: bool,
    /// Whether anything was reset (false without confirmation).
    pub reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The reset command implementation.
pub struct ResetCommand<'a, S: StateStore> {
    game: &'a mut GameStore<S>,
}

impl<'a, S: StateStore> ResetCommand<'a, S> {
    pub fn new(game: &'a mut GameStore<S>) -> Self {
        Self { game }
    }

    pub fn run(&mut self, confirmed: bool) -> ResetOutput {
        if !confirmed {
            return ResetOutput {
                success: false,
                reset: false,
                error: Some(
                    "This erases XP, streak, badges and lesson progress. Re-run with --yes to confirm"
                        .to_string(),
                ),
            };
        }

        self.game.reset_progress();
        ResetOutput {
            success: true,
            reset: true,
            error: None,
        }
    }

    pub fn format_output(&self, output: &ResetOutput, options: &OutputOptions) -> String {
        render(output, options, |output| match &output.error {
            Some(error) => format!("{}.\n", error),
            None => "Progress reset. Welcome back to level 1.\n".to_string(),
        })
    }
}
