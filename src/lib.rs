//! CodeQuest - a gamified programming tutor for the terminal
//!
//! Learners pick Python or JavaScript and work through levels of short
//! lessons. Correct answers earn XP and streak days; wrong ones cost hearts.
//! Progress is kept in a single JSON document between runs.

pub mod catalog;
pub mod chat;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod progress;
pub mod storage;

pub use catalog::{Catalog, Catalogs, Language, Question, QuestionKind};
pub use chat::{ChatSession, ChatTransport, HttpTransport};
pub use config::Config;
pub use core::{LessonSummary, PracticeMode, ProgressState, QuizPhase, QuizSession};
pub use error::{QuestError, Result};
pub use progress::GameStore;
pub use storage::{FileStateStore, MemoryStateStore, StateStore};

// CLI commands
pub use cli::{
    AskCommand, LanguageCommand, MapCommand, PlayCommand, PracticeCommand, ResetCommand,
    StatusCommand, TheoryCommand,
};
