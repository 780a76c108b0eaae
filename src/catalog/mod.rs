//! Course catalog for CodeQuest.
//!
//! A catalog is the immutable course for one language track: ordered
//! levels, each with ordered lessons, each with ordered questions. Two
//! tracks ship with the binary as TOML documents and are validated on load.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};

const PYTHON_TRACK: &str = include_str!("data/python.toml");
const JAVASCRIPT_TRACK: &str = include_str!("data/javascript.toml");

/// Language track a learner can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
}

impl Language {
    /// All tracks, in menu order.
    pub const ALL: [Language; 2] = [Language::Python, Language::Javascript];

    /// Stable identifier used in the state file and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
        }
    }

    /// Human-readable track name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Javascript => "JavaScript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = QuestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::Javascript),
            other => Err(QuestError::not_found(format!("language track '{}'", other))),
        }
    }
}

/// Question variant. Decides how an answer is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    Mcq,
    FillBlank,
    FixCode,
    OutputPrediction,
}

impl QuestionKind {
    /// Whether the learner types the answer instead of picking an option.
    pub fn is_free_text(&self) -> bool {
        !matches!(self, QuestionKind::Mcq)
    }

    /// Whether an answer may span several lines (code and program output).
    pub fn is_multiline(&self) -> bool {
        matches!(self, QuestionKind::FixCode | QuestionKind::OutputPrediction)
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Mcq => "multiple choice",
            QuestionKind::FillBlank => "fill in the blank",
            QuestionKind::FixCode => "fix the code",
            QuestionKind::OutputPrediction => "predict the output",
        }
    }
}

/// One selectable answer of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

/// A single gradable prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    /// Source snippet shown with the prompt.
    #[serde(default)]
    pub code: Option<String>,
    /// Option id for multiple choice, literal text otherwise.
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

/// An ordered set of questions; the unit of completion and XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub xp_reward: u32,
    pub questions: Vec<Question>,
}

/// Worked example on a theory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoryExample {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Instructional page shown before a level's first quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theory {
    pub title: String,
    pub points: Vec<String>,
    #[serde(default)]
    pub examples: Vec<TheoryExample>,
}

/// A stage of the course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub total_xp: u32,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub theory: Option<Theory>,
    pub lessons: Vec<Lesson>,
}

impl Level {
    /// Position of a lesson within this level.
    pub fn lesson_index(&self, lesson_id: &str) -> Option<usize> {
        self.lessons.iter().position(|l| l.id == lesson_id)
    }
}

/// The full course for one language track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub language: Language,
    pub levels: Vec<Level>,
}

impl Catalog {
    /// Parse and validate a catalog from TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog =
            toml::from_str(content).map_err(|e| QuestError::catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load the course bundled with the binary for a track.
    pub fn bundled(language: Language) -> Result<Self> {
        let content = match language {
            Language::Python => PYTHON_TRACK,
            Language::Javascript => JAVASCRIPT_TRACK,
        };
        Self::from_toml(content)
    }

    /// Look up a level by id.
    pub fn level(&self, level_id: u32) -> Option<&Level> {
        self.levels.iter().find(|l| l.id == level_id)
    }

    /// Look up a lesson by id, with its level and position.
    pub fn lesson(&self, lesson_id: &str) -> Option<(&Level, usize, &Lesson)> {
        self.levels.iter().find_map(|level| {
            level
                .lessons
                .iter()
                .enumerate()
                .find(|(_, lesson)| lesson.id == lesson_id)
                .map(|(idx, lesson)| (level, idx, lesson))
        })
    }

    /// Highest level id (levels are numbered 1..=n).
    pub fn last_level_id(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Number of lessons across all levels.
    pub fn total_lessons(&self) -> usize {
        self.levels.iter().map(|l| l.lessons.len()).sum()
    }

    /// Check the structural invariants of a catalog.
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(QuestError::catalog("catalog has no levels"));
        }

        let mut lesson_ids = HashSet::new();
        let mut question_ids = HashSet::new();

        for (idx, level) in self.levels.iter().enumerate() {
            let expected = idx as u32 + 1;
            if level.id != expected {
                return Err(QuestError::catalog(format!(
                    "level ids must be sequential from 1: found {} at position {}",
                    level.id, expected
                )));
            }
            if level.lessons.is_empty() {
                return Err(QuestError::catalog(format!(
                    "level {} has no lessons",
                    level.id
                )));
            }

            for lesson in &level.lessons {
                if !lesson_ids.insert(lesson.id.as_str()) {
                    return Err(QuestError::catalog(format!(
                        "duplicate lesson id {}",
                        lesson.id
                    )));
                }
                if lesson.xp_reward == 0 {
                    return Err(QuestError::catalog(format!(
                        "lesson {} has no XP reward",
                        lesson.id
                    )));
                }
                if lesson.questions.is_empty() {
                    return Err(QuestError::catalog(format!(
                        "lesson {} has no questions",
                        lesson.id
                    )));
                }

                for question in &lesson.questions {
                    if !question_ids.insert(question.id.as_str()) {
                        return Err(QuestError::catalog(format!(
                            "duplicate question id {}",
                            question.id
                        )));
                    }
                    validate_question(question)?;
                }
            }
        }

        Ok(())
    }
}

fn validate_question(question: &Question) -> Result<()> {
    match question.kind {
        QuestionKind::Mcq => {
            if !(2..=4).contains(&question.options.len()) {
                return Err(QuestError::catalog(format!(
                    "question {} needs 2 to 4 options, has {}",
                    question.id,
                    question.options.len()
                )));
            }
            let matching = question
                .options
                .iter()
                .filter(|o| o.id == question.correct_answer)
                .count();
            if matching != 1 {
                return Err(QuestError::catalog(format!(
                    "question {} must have exactly one option with id '{}'",
                    question.id, question.correct_answer
                )));
            }
        }
        _ => {
            if !question.options.is_empty() {
                return Err(QuestError::catalog(format!(
                    "question {} is free text but lists options",
                    question.id
                )));
            }
            if question.correct_answer.trim().is_empty() {
                return Err(QuestError::catalog(format!(
                    "question {} has an empty answer",
                    question.id
                )));
            }
        }
    }
    Ok(())
}

/// The course for every track, selected by the learner's language.
#[derive(Debug, Clone)]
pub struct Catalogs {
    python: Catalog,
    javascript: Catalog,
}

impl Catalogs {
    /// Build from explicit catalogs.
    pub fn new(python: Catalog, javascript: Catalog) -> Self {
        Self { python, javascript }
    }

    /// Load both bundled tracks.
    pub fn bundled() -> Result<Self> {
        Ok(Self::new(
            Catalog::bundled(Language::Python)?,
            Catalog::bundled(Language::Javascript)?,
        ))
    }

    /// The catalog for a language. No choice yet means the Python track.
    pub fn for_language(&self, language: Option<Language>) -> &Catalog {
        match language {
            Some(Language::Javascript) => &self.javascript,
            Some(Language::Python) | None => &self.python,
        }
    }
}
