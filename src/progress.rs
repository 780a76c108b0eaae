//! The progression store.
//!
//! `GameStore` owns the current snapshot, the course catalogs, the storage
//! backend and the configuration. Every mutation runs a pure transition from
//! [`crate::core::state`], swaps the snapshot in and writes the whole document
//! through to storage. Write failures are logged and otherwise ignored; the
//! in-memory snapshot stays authoritative for the rest of the session.

use chrono::{Local, NaiveDate};

use crate::catalog::{Catalog, Catalogs, Language};
use crate::config::Config;
use crate::core::state::{LessonProgress, LessonProgressUpdate, ProgressState};
use crate::core::unlock::{self, LessonRef};
use crate::error::FailOpen;
use crate::storage::StateStore;

/// Progression store bound to one storage backend.
#[derive(Debug)]
pub struct GameStore<S: StateStore> {
    state: ProgressState,
    catalogs: Catalogs,
    store: S,
    config: Config,
    today: NaiveDate,
}

impl<S: StateStore> GameStore<S> {
    /// Load progression for today's local date.
    pub fn open(store: S, catalogs: Catalogs, config: Config) -> Self {
        Self::open_on(store, catalogs, config, Local::now().date_naive())
    }

    /// Load progression as if the session started on `today`.
    ///
    /// Missing or malformed documents fall back to defaults field by field.
    /// The loaded snapshot is normalized, the daily rules are applied and
    /// the result is written back.
    pub fn open_on(store: S, catalogs: Catalogs, config: Config, today: NaiveDate) -> Self {
        let max_hearts = config.progression.max_hearts;
        let defaults = ProgressState::new(max_hearts, today);

        let state = match store.load().fail_open_default("Failed to load progress") {
            Some(document) => ProgressState::merge_persisted(defaults, &document),
            None => defaults,
        };

        let catalog = catalogs.for_language(state.preferred_language);
        let state = state
            .normalize(max_hearts, catalog)
            .begin_day(today, &config.progression);

        tracing::debug!(
            xp = state.xp,
            hearts = state.hearts,
            level = state.current_level,
            "progress loaded"
        );

        let game = Self {
            state,
            catalogs,
            store,
            config,
            today,
        };
        game.persist();
        game
    }

    fn persist(&self) {
        self.store
            .save(&self.state)
            .fail_open_default("Failed to save progress");
    }

    fn commit(&mut self, next: ProgressState) -> &ProgressState {
        self.state = next;
        self.persist();
        &self.state
    }

    fn apply(&mut self, transition: impl FnOnce(ProgressState) -> ProgressState) -> &ProgressState {
        let next = transition(self.state.clone());
        self.commit(next)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn add_xp(&mut self, amount: u32) -> &ProgressState {
        self.apply(|s| s.add_xp(amount))
    }

    pub fn lose_heart(&mut self) -> &ProgressState {
        self.apply(ProgressState::lose_heart)
    }

    pub fn restore_hearts(&mut self) -> &ProgressState {
        self.apply(ProgressState::restore_hearts)
    }

    pub fn increment_streak(&mut self) -> &ProgressState {
        self.apply(ProgressState::increment_streak)
    }

    pub fn reset_streak(&mut self) -> &ProgressState {
        self.apply(ProgressState::reset_streak)
    }

    /// Record a completed lesson in the active track.
    pub fn complete_lesson(&mut self, lesson_id: &str) -> &ProgressState {
        let catalog = self.catalogs.for_language(self.state.preferred_language);
        let next = self.state.clone().complete_lesson(lesson_id, catalog);
        tracing::info!(lesson = lesson_id, "lesson completed");
        self.commit(next)
    }

    pub fn update_lesson_progress(
        &mut self,
        lesson_id: &str,
        update: LessonProgressUpdate,
    ) -> &ProgressState {
        self.apply(|s| s.update_lesson_progress(lesson_id, update))
    }

    pub fn unlock_badge(&mut self, badge: &str) -> &ProgressState {
        self.apply(|s| s.unlock_badge(badge))
    }

    /// Switch tracks; progression restarts at level 1 of the new catalog.
    pub fn set_preferred_language(&mut self, language: Language) -> &ProgressState {
        tracing::info!(language = %language, "track selected");
        self.apply(|s| s.set_preferred_language(language))
    }

    pub fn mark_theory_viewed(&mut self, level_id: u32) -> &ProgressState {
        self.apply(|s| s.mark_theory_viewed(level_id))
    }

    /// Forget everything. The stored document is removed and the snapshot
    /// goes back to a new learner's state.
    pub fn reset_progress(&mut self) -> &ProgressState {
        self.store
            .clear()
            .fail_open_default("Failed to clear progress");
        self.state = ProgressState::new(self.config.progression.max_hearts, self.today);
        tracing::info!("progress reset");
        &self.state
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current snapshot.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Catalog of the active track (Python when none was chosen).
    pub fn course(&self) -> &Catalog {
        self.catalogs.for_language(self.state.preferred_language)
    }

    pub fn is_level_unlocked(&self, level_id: u32) -> bool {
        unlock::is_level_unlocked(&self.state, level_id)
    }

    pub fn is_lesson_unlocked(&self, level_id: u32, lesson_index: usize) -> bool {
        unlock::is_lesson_unlocked(&self.state, self.course(), level_id, lesson_index)
    }

    pub fn lesson_progress(&self, lesson_id: &str) -> Option<&LessonProgress> {
        self.state.lesson_progress(lesson_id)
    }

    pub fn current_lesson(&self) -> Option<LessonRef> {
        unlock::current_lesson(&self.state, self.course())
    }

    pub fn has_viewed_theory(&self, level_id: u32) -> bool {
        self.state.has_viewed_theory(level_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use crate::config::ProgressionConfig;
    use crate::storage::MemoryStateStore;
    use serde_json::json;
    use std::sync::Arc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn open_with(store: Arc<MemoryStateStore>, config: Config) -> GameStore<Arc<MemoryStateStore>> {
        GameStore::open_on(store, fixtures::catalogs(), config, day("2026-10-18"))
    }

    fn open(store: Arc<MemoryStateStore>) -> GameStore<Arc<MemoryStateStore>> {
        open_with(store, Config::default())
    }

    #[test]
    fn test_open_empty_uses_defaults_and_persists() {
        let store = Arc::new(MemoryStateStore::new());
        let game = open(Arc::clone(&store));

        assert_eq!(game.state().hearts, 5);
        assert_eq!(game.state().current_level, 1);
        assert_eq!(game.state().last_played_date, "2026-10-18");

        let saved = store.document().unwrap();
        assert_eq!(saved["hearts"], 5);
    }

    #[test]
    fn test_open_refills_hearts_on_new_day() {
        let store = Arc::new(MemoryStateStore::with_document(json!({
            "xp": 30,
            "hearts": 0,
            "lastPlayedDate": "2026-10-17"
        })));
        let game = open(Arc::clone(&store));

        assert_eq!(game.state().hearts, 5);
        assert_eq!(game.state().xp, 30);
        assert_eq!(game.state().last_played_date, "2026-10-18");
        assert_eq!(store.document().unwrap()["lastPlayedDate"], "2026-10-18");
    }

    #[test]
    fn test_open_same_day_keeps_hearts() {
        let store = Arc::new(MemoryStateStore::with_document(json!({
            "hearts": 2,
            "lastPlayedDate": "2026-10-18"
        })));
        let game = open(store);
        assert_eq!(game.state().hearts, 2);
    }

    #[test]
    fn test_open_clamps_loaded_values() {
        let store = Arc::new(MemoryStateStore::with_document(json!({
            "hearts": 40,
            "maxHearts": 40,
            "currentLevel": 99,
            "lastPlayedDate": "2026-10-18"
        })));
        let game = open(store);
        assert_eq!(game.state().max_hearts, 5);
        assert_eq!(game.state().hearts, 5);
        assert_eq!(game.state().current_level, 3);
    }

    #[test]
    fn test_open_non_object_document_yields_defaults() {
        let store = Arc::new(MemoryStateStore::with_document(json!("garbage")));
        let game = open(store);
        assert_eq!(game.state().xp, 0);
        assert_eq!(game.state().hearts, 5);
    }

    #[test]
    fn test_open_reset_policy_zeroes_streak_after_gap() {
        let store = Arc::new(MemoryStateStore::with_document(json!({
            "streak": 6,
            "lastPlayedDate": "2026-10-10"
        })));
        let config = Config {
            progression: ProgressionConfig {
                missed_day_policy: "reset".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let game = open_with(store, config);
        assert_eq!(game.state().streak, 0);
    }

    #[test]
    fn test_mutations_write_through() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(Arc::clone(&store));
        let before = store.save_count();

        game.add_xp(15);
        game.lose_heart();
        game.increment_streak();

        assert_eq!(store.save_count(), before + 3);
        let saved = store.document().unwrap();
        assert_eq!(saved["xp"], 15);
        assert_eq!(saved["hearts"], 4);
        assert_eq!(saved["streak"], 1);
    }

    #[test]
    fn test_failed_write_keeps_session_going() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(Arc::clone(&store));

        store.set_fail_writes(true);
        let state = game.add_xp(20);
        assert_eq!(state.xp, 20);

        // The document still holds the last good write
        assert_eq!(store.document().unwrap()["xp"], 0);
    }

    #[test]
    fn test_state_survives_reopen() {
        let store = Arc::new(MemoryStateStore::new());
        {
            let mut game = open(Arc::clone(&store));
            game.complete_lesson("1-1");
            game.mark_theory_viewed(1);
            game.unlock_badge("Badge 1");
        }

        let game = open(store);
        assert!(game.state().has_completed("1-1"));
        assert!(game.has_viewed_theory(1));
        assert!(game.state().earned_badges.contains("Badge 1"));
    }

    #[test]
    fn test_complete_level_unlocks_next() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(store);

        assert!(!game.is_level_unlocked(2));
        game.complete_lesson("1-1");
        assert!(game.is_lesson_unlocked(1, 1));
        game.complete_lesson("1-2");
        assert!(game.is_level_unlocked(2));
        assert_eq!(game.current_lesson().unwrap().lesson_id, "2-1");
    }

    #[test]
    fn test_course_follows_language() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(store);
        assert_eq!(game.course().language, Language::Python);

        game.set_preferred_language(Language::Javascript);
        assert_eq!(game.course().language, Language::Javascript);
    }

    #[test]
    fn test_set_language_restarts_track() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(store);
        game.complete_lesson("1-1");
        game.complete_lesson("1-2");
        game.add_xp(40);

        let state = game.set_preferred_language(Language::Javascript);
        assert_eq!(state.current_level, 1);
        assert!(state.completed_lessons.is_empty());
        assert_eq!(state.xp, 40);
    }

    #[test]
    fn test_update_lesson_progress() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(Arc::clone(&store));
        game.update_lesson_progress(
            "1-1",
            LessonProgressUpdate {
                current_question: Some(1),
                correct_answers: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(game.lesson_progress("1-1").unwrap().correct_answers, 1);
        assert_eq!(
            store.document().unwrap()["lessonProgress"]["1-1"]["currentQuestion"],
            1
        );
    }

    #[test]
    fn test_reset_progress() {
        let store = Arc::new(MemoryStateStore::new());
        let mut game = open(Arc::clone(&store));
        game.add_xp(100);
        game.complete_lesson("1-1");

        let state = game.reset_progress();
        assert_eq!(state.xp, 0);
        assert!(state.completed_lessons.is_empty());
        assert!(store.document().is_none());
    }
}
