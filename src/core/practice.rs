//! Practice over completed lessons.
//!
//! Practice reuses questions the learner has already passed. It is graded
//! like a quiz but never touches hearts, XP or the streak.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Question};
use crate::core::grading;
use crate::core::state::ProgressState;
use crate::error::{QuestError, Result};

/// Questions in a quick practice round.
pub const QUICK_PRACTICE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    /// Five random questions.
    Quick,
    /// Every question of one completed lesson.
    Targeted,
    /// Every available question, shuffled.
    Random,
}

impl PracticeMode {
    pub const ALL: [PracticeMode; 3] = [
        PracticeMode::Quick,
        PracticeMode::Targeted,
        PracticeMode::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeMode::Quick => "quick",
            PracticeMode::Targeted => "targeted",
            PracticeMode::Random => "random",
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PracticeMode {
    type Err = QuestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(PracticeMode::Quick),
            "targeted" => Ok(PracticeMode::Targeted),
            "random" => Ok(PracticeMode::Random),
            other => Err(QuestError::not_found(format!("practice mode {}", other))),
        }
    }
}

/// Whether a mode can be started right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeAvailability {
    pub mode: PracticeMode,
    pub available: bool,
}

/// Questions from completed lessons, in catalog order.
pub fn practice_pool<'a>(state: &ProgressState, catalog: &'a Catalog) -> Vec<&'a Question> {
    catalog
        .levels
        .iter()
        .flat_map(|level| level.lessons.iter())
        .filter(|lesson| state.has_completed(&lesson.id))
        .flat_map(|lesson| lesson.questions.iter())
        .collect()
}

pub fn is_available(state: &ProgressState, catalog: &Catalog, mode: PracticeMode) -> bool {
    match mode {
        PracticeMode::Quick => practice_pool(state, catalog).len() >= QUICK_PRACTICE_SIZE,
        PracticeMode::Targeted => !state.completed_lessons.is_empty(),
        PracticeMode::Random => !practice_pool(state, catalog).is_empty(),
    }
}

pub fn availability(state: &ProgressState, catalog: &Catalog) -> Vec<ModeAvailability> {
    PracticeMode::ALL
        .iter()
        .map(|&mode| ModeAvailability {
            mode,
            available: is_available(state, catalog, mode),
        })
        .collect()
}

/// Pick the questions for a practice round.
///
/// Targeted practice uses `lesson_id`, or the first completed lesson when
/// none is given.
pub fn build_round<R: Rng + ?Sized>(
    state: &ProgressState,
    catalog: &Catalog,
    mode: PracticeMode,
    lesson_id: Option<&str>,
    rng: &mut R,
) -> Result<Vec<Question>> {
    if !is_available(state, catalog, mode) {
        return Err(QuestError::invalid_state(format!(
            "{} practice is not available yet; complete more lessons",
            mode
        )));
    }

    let questions = match mode {
        PracticeMode::Quick => {
            let pool = practice_pool(state, catalog);
            pool.choose_multiple(rng, QUICK_PRACTICE_SIZE)
                .map(|q| (*q).clone())
                .collect()
        }
        PracticeMode::Targeted => {
            let lesson = match lesson_id {
                Some(id) => {
                    let (_, _, lesson) = catalog
                        .lesson(id)
                        .ok_or_else(|| QuestError::not_found(format!("lesson {}", id)))?;
                    if !state.has_completed(id) {
                        return Err(QuestError::invalid_state(format!(
                            "lesson {} is not completed yet",
                            id
                        )));
                    }
                    lesson
                }
                None => catalog
                    .levels
                    .iter()
                    .flat_map(|level| level.lessons.iter())
                    .find(|lesson| state.has_completed(&lesson.id))
                    .ok_or_else(|| QuestError::invalid_state("no completed lesson to practice"))?,
            };
            lesson.questions.clone()
        }
        PracticeMode::Random => {
            let mut questions: Vec<Question> = practice_pool(state, catalog)
                .into_iter()
                .cloned()
                .collect();
            questions.shuffle(rng);
            questions
        }
    };

    tracing::debug!(mode = %mode, questions = questions.len(), "practice round built");
    Ok(questions)
}

/// Score of a finished practice round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSummary {
    pub correct: usize,
    pub total: usize,
    pub accuracy: u32,
}

/// A practice round in progress.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    mode: PracticeMode,
    questions: Vec<Question>,
    index: usize,
    correct: usize,
}

impl PracticeSession {
    pub fn new(mode: PracticeMode, questions: Vec<Question>) -> Self {
        Self {
            mode,
            questions,
            index: 0,
            correct: 0,
        }
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.index, self.questions.len())
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.questions.len()
    }

    /// Grade an answer and move on. Returns whether it was correct.
    pub fn answer(&mut self, answer: &str) -> Result<bool> {
        let question = self
            .current_question()
            .ok_or_else(|| QuestError::invalid_state("practice round is over"))?;
        if answer.trim().is_empty() {
            return Err(QuestError::invalid_state("answer is empty"));
        }
        let correct = grading::is_correct(question, answer);
        if correct {
            self.correct += 1;
        }
        self.index += 1;
        Ok(correct)
    }

    pub fn summary(&self) -> PracticeSummary {
        let total = self.questions.len();
        PracticeSummary {
            correct: self.correct,
            total,
            accuracy: grading::accuracy(self.correct, total),
        }
    }
}
