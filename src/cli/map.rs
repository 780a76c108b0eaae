//! Map command for CodeQuest.
//!
//! Lists every level of the active track with its lessons and lock state.

use serde::Serialize;

use crate::cli::{render, track_error, OutputOptions};
use crate::core::unlock::{self, LevelStatus};
use crate::progress::GameStore;
use crate::storage::StateStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLesson {
    pub id: String,
    pub title: String,
    pub xp_reward: u32,
    pub completed: bool,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLevel {
    #[serde(flatten)]
    pub status: LevelStatus,
    pub lessons: Vec<MapLesson>,
}

/// Output format for the map command.
#[derive(Debug, Clone, Serialize)]
pub struct MapOutput {
    pub success: bool,
    pub language: String,
    pub levels: Vec<MapLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The map command implementation.
pub struct MapCommand<'a, S: StateStore> {
    game: &'a GameStore<S>,
}

impl<'a, S: StateStore> MapCommand<'a, S> {
    pub fn new(game: &'a GameStore<S>) -> Self {
        Self { game }
    }

    pub fn run(&self) -> MapOutput {
        let state = self.game.state();
        let course = self.game.course();

        if let Some(error) = track_error(self.game) {
            return MapOutput {
                success: false,
                language: course.language.display_name().to_string(),
                levels: Vec::new(),
                error: Some(error),
            };
        }

        let levels = unlock::level_overview(state, course)
            .into_iter()
            .zip(course.levels.iter())
            .map(|(status, level)| MapLevel {
                lessons: level
                    .lessons
                    .iter()
                    .enumerate()
                    .map(|(idx, lesson)| MapLesson {
                        id: lesson.id.clone(),
                        title: lesson.title.clone(),
                        xp_reward: lesson.xp_reward,
                        completed: state.has_completed(&lesson.id),
                        unlocked: self.game.is_lesson_unlocked(level.id, idx),
                    })
                    .collect(),
                status,
            })
            .collect();

        MapOutput {
            success: true,
            language: course.language.display_name().to_string(),
            levels,
            error: None,
        }
    }

    pub fn format_output(&self, output: &MapOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &MapOutput) -> String {
        if let Some(error) = &output.error {
            return format!("{}\n", error);
        }
        let mut text = format!("{} course map\n", output.language);

        for level in &output.levels {
            let status = &level.status;
            let marker = if status.complete {
                "✓"
            } else if status.unlocked {
                "▶"
            } else {
                "🔒"
            };
            text.push_str(&format!(
                "\n{} Level {} {} {} ({}/{} · {}%)\n",
                marker,
                status.level_id,
                status.icon,
                status.title,
                status.completed_lessons,
                status.total_lessons,
                status.percent
            ));
            if let Some(badge) = &status.badge {
                let earned = if status.badge_earned { "earned" } else { "locked" };
                text.push_str(&format!("    Badge: {} ({})\n", badge, earned));
            }
            for lesson in &level.lessons {
                let mark = if lesson.completed {
                    "[x]"
                } else if lesson.unlocked {
                    "[ ]"
                } else {
                    "[-]"
                };
                text.push_str(&format!(
                    "    {} {} {} (+{} XP)\n",
                    mark, lesson.id, lesson.title, lesson.xp_reward
                ));
            }
        }

        text
    }
}
