//! Quiz session state machine.
//!
//! A session walks one lesson question by question. Grading feedback is a
//! phase of its own (`Answered`) so the front end can hold it on screen for
//! the configured delay before calling [`QuizSession::reveal`]. All effects
//! on progression go through the [`GameStore`] passed to each transition.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Lesson, Question};
use crate::core::grading;
use crate::core::state::LessonProgressUpdate;
use crate::core::unlock::{self, LessonRef};
use crate::error::{QuestError, Result};
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Where a quiz session stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum QuizPhase {
    /// Waiting for an answer to the current question.
    Presenting,
    /// Feedback for the last answer is on screen.
    Answered { correct: bool },
    /// The explanation for a missed question is on screen.
    Explanation,
    /// Hearts ran low after a miss.
    HeartsDepleted { hearts_left: u32 },
    /// Every question was answered; rewards have been applied.
    LessonComplete(LessonSummary),
    /// The learner left; nothing was awarded.
    Exited,
}

impl QuizPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuizPhase::LessonComplete(_) | QuizPhase::Exited)
    }

    fn name(&self) -> &'static str {
        match self {
            QuizPhase::Presenting => "presenting",
            QuizPhase::Answered { .. } => "answered",
            QuizPhase::Explanation => "explanation",
            QuizPhase::HeartsDepleted { .. } => "hearts-depleted",
            QuizPhase::LessonComplete(_) => "lesson-complete",
            QuizPhase::Exited => "exited",
        }
    }
}

/// Result screen of a finished lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub lesson_id: String,
    pub xp_earned: u32,
    pub correct: usize,
    pub total: usize,
    pub accuracy: u32,
    pub stars: u8,
    /// Badge awarded by this lesson, if it finished the level.
    pub badge: Option<String>,
    /// Whether the next level opened.
    pub level_up: bool,
}

/// Why an answer was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Blank answers are ignored rather than graded.
    #[error("answer is empty")]
    EmptyAnswer,
    #[error(transparent)]
    Quest(#[from] QuestError),
}

/// One run through a lesson.
#[derive(Debug, Clone)]
pub struct QuizSession {
    level_id: u32,
    lesson: Lesson,
    question_index: usize,
    correct_count: usize,
    phase: QuizPhase,
    explanation: Option<String>,
}

impl QuizSession {
    /// Start a session on an already resolved lesson.
    pub fn new(level_id: u32, lesson: Lesson) -> Self {
        Self {
            level_id,
            lesson,
            question_index: 0,
            correct_count: 0,
            phase: QuizPhase::Presenting,
            explanation: None,
        }
    }

    /// Start a session after checking the lesson is open to the learner.
    pub fn start<S: StateStore>(game: &GameStore<S>, lesson_id: &str) -> Result<Self> {
        let course = game.course();
        let LessonRef {
            level_id,
            lesson_index,
            ..
        } = unlock::check_lesson_access(game.state(), course, lesson_id)?;

        let lesson = course
            .level(level_id)
            .and_then(|level| level.lessons.get(lesson_index))
            .ok_or_else(|| QuestError::not_found(format!("lesson {}", lesson_id)))?;

        tracing::debug!(lesson = lesson_id, "quiz started");
        Ok(Self::new(level_id, lesson.clone()))
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    pub fn level_id(&self) -> u32 {
        self.level_id
    }

    /// Zero-based index of the current question.
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn total_questions(&self) -> usize {
        self.lesson.questions.len()
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    /// The question being worked on, `None` once the session is over.
    pub fn current_question(&self) -> Option<&Question> {
        if self.phase.is_terminal() {
            return None;
        }
        self.lesson.questions.get(self.question_index)
    }

    /// Explanation of the last missed question.
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Transition: Presenting → Answered
    ///
    /// Grades the answer. A miss costs a heart. Returns whether the answer
    /// was correct.
    pub fn submit<S: StateStore>(
        &mut self,
        game: &mut GameStore<S>,
        answer: &str,
    ) -> std::result::Result<bool, SubmitError> {
        self.expect_phase("submit an answer", |p| matches!(p, QuizPhase::Presenting))?;

        if answer.trim().is_empty() {
            return Err(SubmitError::EmptyAnswer);
        }

        let question = self
            .lesson
            .questions
            .get(self.question_index)
            .ok_or_else(|| QuestError::invalid_state("no question to answer"))?;
        let correct = grading::is_correct(question, answer);

        if correct {
            self.correct_count += 1;
            self.explanation = None;
        } else {
            self.explanation = Some(question.explanation.clone());
            game.lose_heart();
        }

        game.update_lesson_progress(
            &self.lesson.id,
            LessonProgressUpdate {
                current_question: Some(self.question_index),
                correct_answers: Some(self.correct_count),
                ..Default::default()
            },
        );

        tracing::debug!(
            lesson = %self.lesson.id,
            question = self.question_index,
            correct,
            "answer graded"
        );
        self.phase = QuizPhase::Answered { correct };
        Ok(correct)
    }

    /// Transition: Answered → Presenting | LessonComplete | Explanation | HeartsDepleted
    ///
    /// Called once the feedback delay has elapsed.
    pub fn reveal<S: StateStore>(&mut self, game: &mut GameStore<S>) -> Result<&QuizPhase> {
        let correct = match self.phase {
            QuizPhase::Answered { correct } => correct,
            _ => return Err(self.invalid("reveal feedback")),
        };

        if correct {
            self.advance(game);
        } else {
            let hearts = game.state().hearts;
            if hearts <= game.config().progression.low_hearts_threshold {
                self.phase = QuizPhase::HeartsDepleted { hearts_left: hearts };
            } else {
                self.phase = QuizPhase::Explanation;
            }
        }
        Ok(&self.phase)
    }

    /// Transition: HeartsDepleted → Explanation (hearts left)
    pub fn continue_learning<S: StateStore>(&mut self, game: &GameStore<S>) -> Result<&QuizPhase> {
        self.expect_phase("continue", |p| matches!(p, QuizPhase::HeartsDepleted { .. }))?;
        if game.state().hearts == 0 {
            return Err(QuestError::invalid_state(
                "Cannot continue with no hearts left; restore hearts or exit",
            ));
        }
        self.phase = QuizPhase::Explanation;
        Ok(&self.phase)
    }

    /// Transition: HeartsDepleted → Explanation (after a full refill)
    pub fn restore_hearts<S: StateStore>(&mut self, game: &mut GameStore<S>) -> Result<&QuizPhase> {
        self.expect_phase("restore hearts", |p| {
            matches!(p, QuizPhase::HeartsDepleted { .. })
        })?;
        game.restore_hearts();
        self.phase = QuizPhase::Explanation;
        Ok(&self.phase)
    }

    /// Transition: Explanation → Presenting | LessonComplete
    pub fn dismiss_explanation<S: StateStore>(
        &mut self,
        game: &mut GameStore<S>,
    ) -> Result<&QuizPhase> {
        self.expect_phase("dismiss the explanation", |p| {
            matches!(p, QuizPhase::Explanation)
        })?;
        self.explanation = None;
        self.advance(game);
        Ok(&self.phase)
    }

    /// Transition: any non-terminal phase → Exited
    ///
    /// Partial progress in the session is discarded.
    pub fn exit(&mut self) -> Result<&QuizPhase> {
        if self.phase.is_terminal() {
            return Err(self.invalid("exit"));
        }
        tracing::debug!(lesson = %self.lesson.id, "quiz exited");
        self.phase = QuizPhase::Exited;
        Ok(&self.phase)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn advance<S: StateStore>(&mut self, game: &mut GameStore<S>) {
        if self.question_index + 1 >= self.total_questions() {
            let summary = self.finalize(game);
            self.phase = QuizPhase::LessonComplete(summary);
        } else {
            self.question_index += 1;
            self.phase = QuizPhase::Presenting;
        }
    }

    fn finalize<S: StateStore>(&mut self, game: &mut GameStore<S>) -> LessonSummary {
        let lesson_id = self.lesson.id.clone();
        let level_before = game.state().current_level;

        game.add_xp(self.lesson.xp_reward);
        game.increment_streak();
        game.complete_lesson(&lesson_id);
        game.update_lesson_progress(
            &lesson_id,
            LessonProgressUpdate {
                completed: Some(true),
                current_question: Some(self.question_index),
                correct_answers: Some(self.correct_count),
            },
        );

        let new_badge = game.course().level(self.level_id).and_then(|level| {
            let done = level
                .lessons
                .iter()
                .all(|l| game.state().has_completed(&l.id));
            level
                .badge
                .clone()
                .filter(|badge| done && !game.state().earned_badges.contains(badge))
        });
        if let Some(badge) = &new_badge {
            game.unlock_badge(badge);
            tracing::info!(badge = %badge, "badge earned");
        }

        let total = self.total_questions();
        let accuracy = grading::accuracy(self.correct_count, total);
        LessonSummary {
            lesson_id,
            xp_earned: self.lesson.xp_reward,
            correct: self.correct_count,
            total,
            accuracy,
            stars: grading::stars(accuracy),
            badge: new_badge,
            level_up: game.state().current_level > level_before,
        }
    }

    fn expect_phase(&self, action: &str, allowed: impl Fn(&QuizPhase) -> bool) -> Result<()> {
        if allowed(&self.phase) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> QuestError {
        QuestError::invalid_state(format!(
            "Cannot {} in {} phase",
            action,
            self.phase.name()
        ))
    }
}
