//! Core types and logic for CodeQuest.
//!
//! The progression snapshot and its transitions, the unlock rules, answer
//! grading, the quiz state machine and practice rounds.

pub mod grading;
pub mod practice;
pub mod quiz;
pub mod state;
pub mod unlock;

pub use practice::{PracticeMode, PracticeSession, PracticeSummary};
pub use quiz::{LessonSummary, QuizPhase, QuizSession, SubmitError};
pub use state::{LessonProgress, LessonProgressUpdate, ProgressState};
pub use unlock::{AccessDenied, LessonEntry, LessonRef, LevelStatus};
