//! Practice command for CodeQuest.
//!
//! Replays questions from completed lessons. Practice is graded but has no
//! effect on hearts, XP or the streak.

use std::io::{BufRead, Write};

use rand::Rng;
use serde::Serialize;

use crate::cli::play::{display_answer, read_answer, resolve_answer, write_question};
use crate::cli::{render, track_error, OutputOptions};
use crate::core::practice::{self, ModeAvailability};
use crate::core::{PracticeMode, PracticeSession, PracticeSummary};
use crate::error::Result;
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the practice command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PracticeMode>,
    /// Every mode and whether it can be started now.
    pub modes: Vec<ModeAvailability>,
    /// Whether the round was played to the end.
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PracticeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The practice command implementation.
pub struct PracticeCommand<'a, S: StateStore> {
    game: &'a GameStore<S>,
}

impl<'a, S: StateStore> PracticeCommand<'a, S> {
    pub fn new(game: &'a GameStore<S>) -> Self {
        Self { game }
    }

    /// List which practice modes are open without starting a round.
    pub fn modes(&self) -> PracticeOutput {
        let error = track_error(self.game);
        PracticeOutput {
            success: error.is_none(),
            mode: None,
            modes: practice::availability(self.game.state(), self.game.course()),
            finished: false,
            summary: None,
            error,
        }
    }

    /// Play one practice round.
    pub fn run<G: Rng + ?Sized, R: BufRead, W: Write>(
        &self,
        mode: &str,
        lesson_id: Option<&str>,
        rng: &mut G,
        input: &mut R,
        out: &mut W,
    ) -> PracticeOutput {
        let mut output = self.modes();
        if output.error.is_some() {
            return output;
        }

        let mode = match mode.parse::<PracticeMode>() {
            Ok(mode) => mode,
            Err(e) => {
                output.success = false;
                output.error = Some(format!("{}. Choose quick, targeted or random", e));
                return output;
            }
        };
        output.mode = Some(mode);

        let questions = match practice::build_round(
            self.game.state(),
            self.game.course(),
            mode,
            lesson_id,
            rng,
        ) {
            Ok(questions) => questions,
            Err(e) => {
                output.success = false;
                output.error = Some(e.to_string());
                return output;
            }
        };

        let mut session = PracticeSession::new(mode, questions);
        match drive(&mut session, input, out) {
            Ok(()) => {
                output.finished = session.is_finished();
                output.summary = Some(session.summary());
            }
            Err(e) => {
                output.success = false;
                output.error = Some(e.to_string());
            }
        }
        output
    }

    pub fn format_output(&self, output: &PracticeOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &PracticeOutput) -> String {
        let mut text = String::new();
        if let Some(error) = &output.error {
            text.push_str(&format!("{}\n", error));
        }
        if let Some(summary) = &output.summary {
            text.push_str(&format!(
                "Practice {}: {}/{} correct ({}%)\n",
                if output.finished { "done" } else { "stopped" },
                summary.correct,
                summary.total,
                summary.accuracy
            ));
        } else {
            text.push_str("Practice modes:\n");
            for entry in &output.modes {
                text.push_str(&format!(
                    "  {:<9} {}\n",
                    entry.mode.as_str(),
                    if entry.available { "ready" } else { "locked" }
                ));
            }
        }
        text
    }
}

fn drive<R: BufRead, W: Write>(
    session: &mut PracticeSession,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    while let Some(question) = session.current_question().cloned() {
        let (index, total) = session.position();
        writeln!(out, "\n[{}/{}] {}", index + 1, total, question.kind.label())?;
        write_question(out, &question)?;

        let Some(line) = read_answer(&question, input)? else {
            return Ok(());
        };
        if line.trim() == ":q" {
            return Ok(());
        }
        if line.trim().is_empty() {
            writeln!(out, "Type an answer (or :q to stop).")?;
            continue;
        }

        if session.answer(&resolve_answer(&question, &line))? {
            writeln!(out, "✓ Correct!")?;
        } else {
            writeln!(out, "✗ Not quite. Answer: {}", display_answer(&question))?;
            if !question.explanation.is_empty() {
                writeln!(out, "  {}", question.explanation)?;
            }
        }
    }
    Ok(())
}
