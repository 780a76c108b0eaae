//! Unlock resolver.
//!
//! Progression is linear. A level is open when its id is at most
//! `current_level`; inside an open level a lesson is open when it is the
//! first one or the lesson right before it has been completed.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::core::state::ProgressState;
use crate::error::QuestError;

/// Position of a lesson in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub level_id: u32,
    pub lesson_index: usize,
    pub lesson_id: String,
}

/// What the learner sees when opening a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonEntry {
    /// The level's theory page has not been shown yet.
    Theory,
    /// Straight to the questions.
    Quiz,
}

/// Why a lesson cannot be opened. Callers send the learner back to the map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("level {0} does not exist")]
    UnknownLevel(u32),
    #[error("lesson {0} does not exist")]
    UnknownLesson(String),
    #[error("level {0} is locked")]
    LevelLocked(u32),
    #[error("lesson {0} is locked")]
    LessonLocked(String),
}

impl From<AccessDenied> for QuestError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::UnknownLevel(_) | AccessDenied::UnknownLesson(_) => {
                QuestError::not_found(denied.to_string())
            }
            AccessDenied::LevelLocked(_) | AccessDenied::LessonLocked(_) => {
                QuestError::invalid_state(denied.to_string())
            }
        }
    }
}

/// One row of the level map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatus {
    pub level_id: u32,
    pub title: String,
    pub icon: String,
    pub unlocked: bool,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub percent: u32,
    pub complete: bool,
    pub theory_viewed: bool,
    pub badge: Option<String>,
    pub badge_earned: bool,
}

pub fn is_level_unlocked(state: &ProgressState, level_id: u32) -> bool {
    level_id <= state.current_level
}

/// Unknown levels and out-of-range indices are locked.
pub fn is_lesson_unlocked(
    state: &ProgressState,
    catalog: &Catalog,
    level_id: u32,
    lesson_index: usize,
) -> bool {
    let Some(level) = catalog.level(level_id) else {
        return false;
    };
    if lesson_index >= level.lessons.len() || !is_level_unlocked(state, level_id) {
        return false;
    }
    lesson_index == 0 || state.has_completed(&level.lessons[lesson_index - 1].id)
}

/// First unlocked lesson that is not completed yet, in catalog order.
///
/// `None` once the whole catalog is done.
pub fn current_lesson(state: &ProgressState, catalog: &Catalog) -> Option<LessonRef> {
    catalog.levels.iter().find_map(|level| {
        level
            .lessons
            .iter()
            .enumerate()
            .find(|(idx, lesson)| {
                !state.has_completed(&lesson.id)
                    && is_lesson_unlocked(state, catalog, level.id, *idx)
            })
            .map(|(idx, lesson)| LessonRef {
                level_id: level.id,
                lesson_index: idx,
                lesson_id: lesson.id.clone(),
            })
    })
}

/// Theory first for a level whose page has not been shown, unless it has none.
pub fn entry_for(state: &ProgressState, catalog: &Catalog, level_id: u32) -> LessonEntry {
    let has_theory = catalog
        .level(level_id)
        .is_some_and(|level| level.theory.is_some());
    if has_theory && !state.has_viewed_theory(level_id) {
        LessonEntry::Theory
    } else {
        LessonEntry::Quiz
    }
}

/// Resolve a `(level, lesson)` pair the learner asked to open.
pub fn check_access(
    state: &ProgressState,
    catalog: &Catalog,
    level_id: u32,
    lesson_id: &str,
) -> Result<LessonRef, AccessDenied> {
    let level = catalog
        .level(level_id)
        .ok_or(AccessDenied::UnknownLevel(level_id))?;
    let lesson_index = level
        .lesson_index(lesson_id)
        .ok_or_else(|| AccessDenied::UnknownLesson(lesson_id.to_string()))?;

    if !is_level_unlocked(state, level_id) {
        return Err(AccessDenied::LevelLocked(level_id));
    }
    if !is_lesson_unlocked(state, catalog, level_id, lesson_index) {
        return Err(AccessDenied::LessonLocked(lesson_id.to_string()));
    }

    Ok(LessonRef {
        level_id,
        lesson_index,
        lesson_id: lesson_id.to_string(),
    })
}

/// Like [`check_access`] when only the lesson id is known.
pub fn check_lesson_access(
    state: &ProgressState,
    catalog: &Catalog,
    lesson_id: &str,
) -> Result<LessonRef, AccessDenied> {
    let (level, _, _) = catalog
        .lesson(lesson_id)
        .ok_or_else(|| AccessDenied::UnknownLesson(lesson_id.to_string()))?;
    check_access(state, catalog, level.id, lesson_id)
}

pub fn level_overview(state: &ProgressState, catalog: &Catalog) -> Vec<LevelStatus> {
    catalog
        .levels
        .iter()
        .map(|level| {
            let total = level.lessons.len();
            let done = level
                .lessons
                .iter()
                .filter(|l| state.has_completed(&l.id))
                .count();
            let percent = if total == 0 {
                0
            } else {
                ((done as f64 / total as f64) * 100.0).round() as u32
            };
            LevelStatus {
                level_id: level.id,
                title: level.title.clone(),
                icon: level.icon.clone(),
                unlocked: is_level_unlocked(state, level.id),
                completed_lessons: done,
                total_lessons: total,
                percent,
                complete: total > 0 && done == total,
                theory_viewed: state.has_viewed_theory(level.id),
                badge_earned: level
                    .badge
                    .as_ref()
                    .is_some_and(|b| state.earned_badges.contains(b)),
                badge: level.badge.clone(),
            }
        })
        .collect()
}
