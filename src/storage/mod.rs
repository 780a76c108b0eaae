//! Persistence for the learner's progression.
//!
//! The whole snapshot lives in one JSON document. The file backend keeps it
//! at `~/.codequest/game-state.json`; the memory backend is for tests.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use traits::StateStore;
