//! Theory command for CodeQuest.
//!
//! Prints a level's theory page and records that it was viewed, so the
//! level's lessons go straight to the questions afterwards.

use serde::Serialize;

use crate::catalog::Theory;
use crate::cli::{render, track_error, OutputOptions};
use crate::core::unlock;
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the theory command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoryOutput {
    pub success: bool,
    pub level_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theory: Option<Theory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TheoryOutput {
    fn failure(level_id: u32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            level_id,
            level_title: None,
            theory: None,
            error: Some(error.into()),
        }
    }
}

/// The theory command implementation.
pub struct TheoryCommand<'a, S: StateStore> {
    game: &'a mut GameStore<S>,
}

impl<'a, S: StateStore> TheoryCommand<'a, S> {
    pub fn new(game: &'a mut GameStore<S>) -> Self {
        Self { game }
    }

    pub fn run(&mut self, level_id: u32) -> TheoryOutput {
        if let Some(error) = track_error(self.game) {
            return TheoryOutput::failure(level_id, error);
        }
        let Some(level) = self.game.course().level(level_id) else {
            return TheoryOutput::failure(level_id, format!("Level {} does not exist", level_id));
        };
        if !unlock::is_level_unlocked(self.game.state(), level_id) {
            return TheoryOutput::failure(level_id, format!("Level {} is locked", level_id));
        }

        let level_title = level.title.clone();
        let Some(theory) = level.theory.clone() else {
            return TheoryOutput::failure(
                level_id,
                format!("Level {} has no theory page", level_id),
            );
        };

        self.game.mark_theory_viewed(level_id);

        TheoryOutput {
            success: true,
            level_id,
            level_title: Some(level_title),
            theory: Some(theory),
            error: None,
        }
    }

    pub fn format_output(&self, output: &TheoryOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &TheoryOutput) -> String {
        match &output.theory {
            Some(theory) => format_theory(output.level_id, theory),
            None => format!(
                "{}\n",
                output.error.as_deref().unwrap_or("Theory unavailable")
            ),
        }
    }
}

/// Plain-text rendering of a theory page.
pub fn format_theory(level_id: u32, theory: &Theory) -> String {
    let mut text = format!("Level {} · {}\n\n", level_id, theory.title);

    for point in &theory.points {
        text.push_str(&format!("  • {}\n", point));
    }

    for example in &theory.examples {
        text.push('\n');
        if let Some(description) = &example.description {
            text.push_str(&format!("  {}\n", description));
        }
        for line in example.code.lines() {
            text.push_str(&format!("    {}\n", line));
        }
    }

    text
}
