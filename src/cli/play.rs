//! Play command for CodeQuest.
//!
//! Runs one lesson interactively: theory page first when the level's page
//! has not been seen, then the questions. Input and output are injected so
//! the whole flow can run against in-memory buffers.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::catalog::{Question, QuestionKind};
use crate::cli::theory::format_theory;
use crate::cli::{hearts_bar, render, track_error, OutputOptions};
use crate::core::unlock::{self, LessonEntry};
use crate::core::{LessonSummary, QuizPhase, QuizSession, SubmitError};
use crate::error::{QuestError, Result};
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the play command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    /// Whether the lesson was finished (false when the learner left).
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LessonSummary>,
    pub xp: u64,
    pub hearts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The play command implementation.
pub struct PlayCommand<'a, S: StateStore> {
    game: &'a mut GameStore<S>,
}

impl<'a, S: StateStore> PlayCommand<'a, S> {
    pub fn new(game: &'a mut GameStore<S>) -> Self {
        Self { game }
    }

    /// Play `lesson_id`, or the next lesson on the learner's path.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        lesson_id: Option<&str>,
        input: &mut R,
        out: &mut W,
    ) -> PlayOutput {
        if let Some(error) = track_error(self.game) {
            return self.output(lesson_id.map(str::to_string), None, Some(error));
        }

        let lesson_id = match lesson_id {
            Some(id) => id.to_string(),
            None => match self.game.current_lesson() {
                Some(next) => next.lesson_id,
                None => {
                    return self.output(None, None, Some("Every lesson is complete".to_string()))
                }
            },
        };

        let mut session = match QuizSession::start(self.game, &lesson_id) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(lesson = %lesson_id, error = %e, "lesson not playable");
                return self.output(
                    Some(lesson_id),
                    None,
                    Some(format!("{}. Run `codequest map` to see open lessons", e)),
                );
            }
        };

        match self.play(&mut session, input, out) {
            Ok(()) => {
                let summary = match session.phase() {
                    QuizPhase::LessonComplete(summary) => Some(summary.clone()),
                    _ => None,
                };
                self.output(Some(lesson_id), summary, None)
            }
            Err(e) => self.output(Some(lesson_id), None, Some(e.to_string())),
        }
    }

    fn output(
        &self,
        lesson_id: Option<String>,
        summary: Option<LessonSummary>,
        error: Option<String>,
    ) -> PlayOutput {
        let state = self.game.state();
        PlayOutput {
            success: error.is_none(),
            lesson_id,
            completed: summary.is_some(),
            summary,
            xp: state.xp,
            hearts: state.hearts,
            error,
        }
    }

    fn play<R: BufRead, W: Write>(
        &mut self,
        session: &mut QuizSession,
        input: &mut R,
        out: &mut W,
    ) -> Result<()> {
        let level_id = session.level_id();
        if unlock::entry_for(self.game.state(), self.game.course(), level_id) == LessonEntry::Theory {
            if let Some(theory) = self
                .game
                .course()
                .level(level_id)
                .and_then(|level| level.theory.clone())
            {
                write!(out, "{}", format_theory(level_id, &theory))?;
                self.game.mark_theory_viewed(level_id);
                writeln!(out, "\nPress Enter to start the quiz.")?;
                out.flush()?;
                if read_line(input)?.is_none() {
                    session.exit()?;
                    return Ok(());
                }
            }
        }

        writeln!(out, "\n{}", session.lesson().title)?;
        let delay = Duration::from_millis(self.game.config().progression.feedback_delay_ms);

        while !session.phase().is_terminal() {
            match session.phase().clone() {
                QuizPhase::Presenting => self.present(session, input, out)?,
                QuizPhase::Answered { correct } => {
                    if correct {
                        writeln!(out, "✓ Correct!")?;
                    } else {
                        writeln!(
                            out,
                            "✗ Not quite. Hearts: {}",
                            hearts_bar(self.game.state().hearts, self.game.state().max_hearts)
                        )?;
                    }
                    out.flush()?;
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    session.reveal(self.game)?;
                }
                QuizPhase::Explanation => {
                    if let Some(explanation) = session.explanation() {
                        writeln!(out, "\nExplanation: {}", explanation)?;
                    }
                    if let Some(question) = session.current_question() {
                        writeln!(out, "Answer: {}", display_answer(question))?;
                    }
                    writeln!(out, "Press Enter to continue.")?;
                    out.flush()?;
                    if read_line(input)?.is_none() {
                        session.exit()?;
                    } else {
                        session.dismiss_explanation(self.game)?;
                    }
                }
                QuizPhase::HeartsDepleted { hearts_left } => {
                    self.hearts_prompt(session, hearts_left, input, out)?
                }
                QuizPhase::LessonComplete(_) | QuizPhase::Exited => {}
            }
        }

        match session.phase() {
            QuizPhase::LessonComplete(summary) => {
                writeln!(out, "\nLesson complete! {}", "★".repeat(summary.stars as usize))?;
            }
            _ => writeln!(out, "\nLesson left. Progress in this lesson was not saved.")?,
        }
        Ok(())
    }

    fn present<R: BufRead, W: Write>(
        &mut self,
        session: &mut QuizSession,
        input: &mut R,
        out: &mut W,
    ) -> Result<()> {
        let Some(question) = session.current_question().cloned() else {
            return Err(QuestError::invalid_state("no question to present"));
        };

        writeln!(
            out,
            "\n[{}/{}] {}  {}",
            session.question_index() + 1,
            session.total_questions(),
            question.kind.label(),
            hearts_bar(self.game.state().hearts, self.game.state().max_hearts)
        )?;
        write_question(out, &question)?;

        let Some(line) = read_answer(&question, input)? else {
            session.exit()?;
            return Ok(());
        };
        if line.trim() == ":q" {
            session.exit()?;
            return Ok(());
        }

        let answer = resolve_answer(&question, &line);
        match session.submit(self.game, &answer) {
            Ok(_) => Ok(()),
            Err(SubmitError::EmptyAnswer) => {
                writeln!(out, "Type an answer (or :q to leave).")?;
                Ok(())
            }
            Err(SubmitError::Quest(e)) => Err(e),
        }
    }

    fn hearts_prompt<R: BufRead, W: Write>(
        &mut self,
        session: &mut QuizSession,
        hearts_left: u32,
        input: &mut R,
        out: &mut W,
    ) -> Result<()> {
        if hearts_left == 0 {
            writeln!(out, "\nYou're out of hearts! [r]estore hearts or [q]uit")?;
        } else {
            writeln!(
                out,
                "\nCareful, only {} heart{} left. [c]ontinue, [r]estore hearts or [q]uit",
                hearts_left,
                if hearts_left == 1 { "" } else { "s" }
            )?;
        }
        write!(out, "> ")?;
        out.flush()?;

        let choice = read_line(input)?.map(|l| l.trim().to_lowercase());
        match choice.as_deref() {
            None | Some("q") | Some("quit") => {
                session.exit()?;
            }
            Some("r") | Some("restore") => {
                session.restore_hearts(self.game)?;
                writeln!(out, "Hearts restored.")?;
            }
            Some("c") | Some("continue") | Some("") if hearts_left > 0 => {
                session.continue_learning(self.game)?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn format_output(&self, output: &PlayOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &PlayOutput) -> String {
        if let Some(error) = &output.error {
            return format!("{}\n", error);
        }
        match &output.summary {
            Some(summary) => {
                let mut text = format!(
                    "+{} XP · {}/{} correct ({}%) · total XP {}\n",
                    summary.xp_earned, summary.correct, summary.total, summary.accuracy, output.xp
                );
                if let Some(badge) = &summary.badge {
                    text.push_str(&format!("Badge earned: {}\n", badge));
                }
                if summary.level_up {
                    text.push_str("A new level is unlocked!\n");
                }
                text
            }
            None => String::new(),
        }
    }
}

/// Read one line; `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Prompt, code and options of a question, ending with the input marker.
pub(crate) fn write_question<W: Write>(out: &mut W, question: &Question) -> Result<()> {
    writeln!(out, "{}", question.prompt)?;
    if let Some(code) = &question.code {
        for line in code.lines() {
            writeln!(out, "    {}", line)?;
        }
    }
    for (idx, option) in question.options.iter().enumerate() {
        writeln!(out, "  {}) {}", idx + 1, option.text)?;
    }
    if question.kind.is_multiline() {
        writeln!(out, "(one or more lines, finish with an empty line)")?;
    }
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

/// Read an answer; `None` at end of input.
///
/// Code and output answers run until an empty line or end of input, and
/// their lines are joined with `\n`. A blank first line or `:q` is
/// returned as is.
pub(crate) fn read_answer<R: BufRead>(question: &Question, input: &mut R) -> Result<Option<String>> {
    let Some(first) = read_line(input)? else {
        return Ok(None);
    };
    if !question.kind.is_multiline() || first.trim().is_empty() || first.trim() == ":q" {
        return Ok(Some(first));
    }

    let mut lines = vec![first];
    while let Some(line) = read_line(input)? {
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(Some(lines.join("\n")))
}

/// Multiple-choice answers may be typed as the option number or its id.
pub(crate) fn resolve_answer(question: &Question, line: &str) -> String {
    if question.kind == QuestionKind::Mcq {
        let trimmed = line.trim();
        if let Ok(number) = trimmed.parse::<usize>() {
            if let Some(option) = number.checked_sub(1).and_then(|i| question.options.get(i)) {
                return option.id.clone();
            }
        }
        return trimmed.to_string();
    }
    line.to_string()
}

/// Expected answer in a readable form.
pub(crate) fn display_answer(question: &Question) -> String {
    match question.kind {
        QuestionKind::Mcq => question
            .options
            .iter()
            .find(|o| o.id == question.correct_answer)
            .map(|o| o.text.clone())
            .unwrap_or_else(|| question.correct_answer.clone()),
        _ => question.correct_answer.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{fixtures, AnswerOption, Catalogs, Language, Theory};
    use crate::cli::test_support::{game, instant_config, new_learner, TestGame};
    use crate::cli::{LanguageCommand, NO_TRACK_MESSAGE};
    use crate::storage::MemoryStateStore;
    use chrono::NaiveDate;
    use std::io::Cursor;
    use std::sync::Arc;

    fn play(game: &mut TestGame, lesson: Option<&str>, script: &str) -> (PlayOutput, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let output = PlayCommand::new(game).run(lesson, &mut input, &mut out);
        (output, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_play_next_lesson_perfect() {
        let mut game = game();
        let (output, transcript) = play(&mut game, None, "ok\nok\n");

        assert!(output.success);
        assert!(output.completed);
        assert_eq!(output.lesson_id.as_deref(), Some("1-1"));
        let summary = output.summary.unwrap();
        assert_eq!(summary.stars, 3);
        assert_eq!(output.xp, 10);
        assert!(transcript.contains("[1/2]"));
        assert!(transcript.contains("✓ Correct!"));
        assert!(transcript.contains("Lesson complete! ★★★"));
        assert!(game.state().has_completed("1-1"));
    }

    #[test]
    fn test_play_wrong_answer_shows_explanation() {
        let mut game = game();
        let (output, transcript) = play(&mut game, Some("1-1"), "nope\n\nok\n");

        assert!(output.completed);
        assert_eq!(output.hearts, 4);
        assert!(transcript.contains("✗ Not quite."));
        assert!(transcript.contains("Explanation: explanation 1-1-1"));
        assert!(transcript.contains("Answer: ok"));
        assert_eq!(output.summary.unwrap().accuracy, 50);
    }

    #[test]
    fn test_play_blank_answer_reprompts() {
        let mut game = game();
        let (output, transcript) = play(&mut game, Some("1-1"), "\nok\nok\n");
        assert!(output.completed);
        assert!(transcript.contains("Type an answer"));
        assert_eq!(output.hearts, 5);
    }

    #[test]
    fn test_play_out_of_hearts_restore() {
        let mut game = game();
        for _ in 0..4 {
            game.lose_heart();
        }
        let (output, transcript) = play(&mut game, Some("1-1"), "nope\nr\n\nok\n");

        assert!(transcript.contains("You're out of hearts!"));
        assert!(transcript.contains("Hearts restored."));
        assert!(output.completed);
        assert_eq!(output.hearts, 5);
    }

    #[test]
    fn test_play_out_of_hearts_quit() {
        let mut game = game();
        for _ in 0..4 {
            game.lose_heart();
        }
        let (output, transcript) = play(&mut game, Some("1-1"), "nope\nq\n");

        assert!(output.success);
        assert!(!output.completed);
        assert!(transcript.contains("Lesson left"));
        assert!(!game.state().has_completed("1-1"));
        assert_eq!(game.state().hearts, 0);
    }

    #[test]
    fn test_play_low_hearts_continue() {
        let mut game = game();
        for _ in 0..3 {
            game.lose_heart();
        }
        let (output, transcript) = play(&mut game, Some("1-1"), "nope\nc\n\nok\n");

        assert!(transcript.contains("only 1 heart left"));
        assert!(output.completed);
        assert_eq!(output.hearts, 1);
    }

    #[test]
    fn test_play_end_of_input_exits() {
        let mut game = game();
        let (output, _) = play(&mut game, Some("1-1"), "ok\n");
        assert!(output.success);
        assert!(!output.completed);
        assert_eq!(game.state().xp, 0);
    }

    #[test]
    fn test_play_locked_lesson() {
        let mut game = game();
        let (output, transcript) = play(&mut game, Some("2-1"), "");
        assert!(!output.success);
        assert!(output.error.unwrap().contains("codequest map"));
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_play_all_done() {
        let mut game = game();
        for id in ["1-1", "1-2", "2-1", "2-2", "3-1"] {
            game.complete_lesson(id);
        }
        let (output, _) = play(&mut game, None, "");
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("Every lesson is complete"));
    }

    #[test]
    fn test_play_shows_theory_first() {
        let mut python = fixtures::catalog(Language::Python, &[1]);
        python.levels[0].theory = Some(Theory {
            title: "Basics".to_string(),
            points: vec!["Variables hold values".to_string()],
            examples: Vec::new(),
        });
        let mut game = GameStore::open_on(
            Arc::new(MemoryStateStore::new()),
            Catalogs::new(python, fixtures::catalog(Language::Javascript, &[1])),
            instant_config(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        game.set_preferred_language(Language::Python);

        let (output, transcript) = play(&mut game, None, "\nok\nok\n");
        assert!(output.completed);
        assert!(transcript.contains("Level 1 · Basics"));
        assert!(game.has_viewed_theory(1));

        // Second time straight to the quiz
        let (_, transcript) = play(&mut game, Some("1-1"), "ok\nok\n");
        assert!(!transcript.contains("Basics"));
    }

    #[test]
    fn test_play_needs_a_track() {
        let mut game = new_learner();
        let (output, transcript) = play(&mut game, None, "ok\nok\n");
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some(NO_TRACK_MESSAGE));
        assert!(transcript.is_empty());
        assert!(game.state().completed_lessons.is_empty());

        LanguageCommand::new(&mut game).run(Some("python"));
        let (output, _) = play(&mut game, None, "ok\nok\n");
        assert!(output.completed);

        // Confirming the same track keeps what was earned on it
        let switched = LanguageCommand::new(&mut game).run(Some("python")).switched;
        assert!(!switched);
        assert!(game.state().has_completed("1-1"));
    }

    #[test]
    fn test_multiline_output_answer_bundled_course() {
        let mut game = GameStore::open_on(
            Arc::new(MemoryStateStore::new()),
            Catalogs::bundled().unwrap(),
            instant_config(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        game.set_preferred_language(Language::Python);
        let earlier: Vec<String> = game
            .course()
            .levels
            .iter()
            .filter(|level| level.id < 4)
            .flat_map(|level| level.lessons.iter().map(|lesson| lesson.id.clone()))
            .collect();
        for id in &earlier {
            game.complete_lesson(id);
        }
        game.mark_theory_viewed(4);
        assert_eq!(game.state().current_level, 4);

        let (output, transcript) = play(&mut game, Some("4-1"), "range\nHi\nHi\n\n");

        assert!(transcript.contains("finish with an empty line"));
        assert!(output.completed);
        assert_eq!(output.hearts, 5);
        assert_eq!(output.summary.unwrap().correct, 2);
    }

    #[test]
    fn test_read_answer_line_rules() {
        let mut question = Question {
            id: "q".to_string(),
            kind: QuestionKind::OutputPrediction,
            prompt: "Output?".to_string(),
            code: None,
            correct_answer: "1\n2".to_string(),
            explanation: String::new(),
            options: Vec::new(),
        };

        let mut input = Cursor::new(b"1\n2\n\nnext\n".to_vec());
        assert_eq!(read_answer(&question, &mut input).unwrap().as_deref(), Some("1\n2"));

        // End of input also ends the answer
        let mut input = Cursor::new(b"1\n2".to_vec());
        assert_eq!(read_answer(&question, &mut input).unwrap().as_deref(), Some("1\n2"));

        let mut input = Cursor::new(b":q\nmore\n".to_vec());
        assert_eq!(read_answer(&question, &mut input).unwrap().as_deref(), Some(":q"));

        let mut input = Cursor::new(Vec::new());
        assert_eq!(read_answer(&question, &mut input).unwrap(), None);

        question.kind = QuestionKind::FillBlank;
        let mut input = Cursor::new(b"one\ntwo\n".to_vec());
        assert_eq!(read_answer(&question, &mut input).unwrap().as_deref(), Some("one"));
    }

    #[test]
    fn test_resolve_answer_mcq_number() {
        let question = Question {
            id: "q".to_string(),
            kind: QuestionKind::Mcq,
            prompt: "Pick".to_string(),
            code: None,
            correct_answer: "b".to_string(),
            explanation: String::new(),
            options: vec![
                AnswerOption {
                    id: "a".to_string(),
                    text: "First".to_string(),
                },
                AnswerOption {
                    id: "b".to_string(),
                    text: "Second".to_string(),
                },
            ],
        };
        assert_eq!(resolve_answer(&question, "2"), "b");
        assert_eq!(resolve_answer(&question, " a "), "a");
        assert_eq!(resolve_answer(&question, "7"), "7");
        assert_eq!(display_answer(&question), "Second");
    }

    #[test]
    fn test_format_output() {
        let mut game = game();
        game.complete_lesson("1-1");
        let mut input = Cursor::new(b"ok\nok\n".to_vec());
        let mut out = Vec::new();
        let mut cmd = PlayCommand::new(&mut game);
        let output = cmd.run(Some("1-2"), &mut input, &mut out);

        let text = cmd.format_output(&output, &OutputOptions::default());
        assert!(text.contains("+10 XP"));
        assert!(text.contains("Badge earned: Badge 1"));
        assert!(text.contains("A new level is unlocked!"));
    }
}
