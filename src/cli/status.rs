//! Status command for CodeQuest.
//!
//! Shows the learner's XP, hearts, streak, level and next lesson.

use serde::Serialize;

use crate::cli::{hearts_bar, render, OutputOptions};
use crate::core::LessonRef;
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the status command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub language: String,
    pub language_chosen: bool,
    pub xp: u64,
    pub hearts: u32,
    pub max_hearts: u32,
    pub streak: u32,
    pub current_level: u32,
    pub last_level: u32,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub badges: Vec<String>,
    /// Next lesson to play, if any remain.
    pub next_lesson: Option<NextLesson>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextLesson {
    #[serde(flatten)]
    pub position: LessonRef,
    pub title: String,
}

/// The status command implementation.
pub struct StatusCommand<'a, S: StateStore> {
    game: &'a GameStore<S>,
}

impl<'a, S: StateStore> StatusCommand<'a, S> {
    pub fn new(game: &'a GameStore<S>) -> Self {
        Self { game }
    }

    pub fn run(&self) -> StatusOutput {
        let state = self.game.state();
        let course = self.game.course();

        let next_lesson = self.game.current_lesson().map(|position| {
            let title = course
                .lesson(&position.lesson_id)
                .map(|(_, _, lesson)| lesson.title.clone())
                .unwrap_or_default();
            NextLesson { position, title }
        });

        StatusOutput {
            language: course.language.display_name().to_string(),
            language_chosen: state.preferred_language.is_some(),
            xp: state.xp,
            hearts: state.hearts,
            max_hearts: state.max_hearts,
            streak: state.streak,
            current_level: state.current_level,
            last_level: course.last_level_id(),
            completed_lessons: state.completed_lessons.len(),
            total_lessons: course.total_lessons(),
            badges: state.earned_badges.iter().cloned().collect(),
            next_lesson,
        }
    }

    pub fn format_output(&self, output: &StatusOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    fn format_human_readable(output: &StatusOutput) -> String {
        let mut text = String::new();

        text.push_str(&format!("CodeQuest · {} track", output.language));
        if !output.language_chosen {
            text.push_str(" (default; pick one with `codequest language`)");
        }
        text.push('\n');
        text.push_str(&format!(
            "  XP: {}   Hearts: {} {}/{}   Streak: {}\n",
            output.xp,
            hearts_bar(output.hearts, output.max_hearts),
            output.hearts,
            output.max_hearts,
            output.streak
        ));
        text.push_str(&format!(
            "  Level {}/{} · {}/{} lessons completed\n",
            output.current_level,
            output.last_level,
            output.completed_lessons,
            output.total_lessons
        ));

        if !output.badges.is_empty() {
            text.push_str(&format!("  Badges: {}\n", output.badges.join(", ")));
        }

        match &output.next_lesson {
            Some(next) => text.push_str(&format!(
                "\nNext up: {} (lesson {}, level {}). Run `codequest play`.\n",
                next.title, next.position.lesson_id, next.position.level_id
            )),
            None => text.push_str("\nEvery lesson is complete. Try `codequest practice`.\n"),
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{game, new_learner};

    #[test]
    fn test_status_fresh_learner() {
        let game = new_learner();
        let output = StatusCommand::new(&game).run();

        assert_eq!(output.language, "Python");
        assert!(!output.language_chosen);
        assert_eq!(output.xp, 0);
        assert_eq!(output.hearts, 5);
        assert_eq!(output.current_level, 1);
        assert_eq!(output.total_lessons, 5);
        assert_eq!(output.next_lesson.unwrap().position.lesson_id, "1-1");
    }

    #[test]
    fn test_status_after_progress() {
        let mut game = game();
        game.add_xp(30);
        game.complete_lesson("1-1");
        game.unlock_badge("Badge 1");

        let output = StatusCommand::new(&game).run();
        assert_eq!(output.xp, 30);
        assert_eq!(output.completed_lessons, 1);
        assert_eq!(output.badges, vec!["Badge 1".to_string()]);
        assert_eq!(output.next_lesson.unwrap().title, "Lesson 1-2");
    }

    #[test]
    fn test_status_all_done() {
        let mut game = game();
        for id in ["1-1", "1-2", "2-1", "2-2", "3-1"] {
            game.complete_lesson(id);
        }
        let cmd = StatusCommand::new(&game);
        let output = cmd.run();
        assert!(output.next_lesson.is_none());

        let text = cmd.format_output(&output, &OutputOptions::default());
        assert!(text.contains("Every lesson is complete"));
    }

    #[test]
    fn test_format_output_human_readable() {
        let game = game();
        let cmd = StatusCommand::new(&game);
        let text = cmd.format_output(&cmd.run(), &OutputOptions::default());
        assert!(text.contains("Python track"));
        assert!(text.contains("♥♥♥♥♥ 5/5"));
        assert!(text.contains("Next up: Lesson 1-1"));
    }

    #[test]
    fn test_format_output_json() {
        let game = game();
        let cmd = StatusCommand::new(&game);
        let options = OutputOptions {
            json: true,
            ..Default::default()
        };
        let text = cmd.format_output(&cmd.run(), &options);
        assert!(text.contains("\"maxHearts\": 5"));
        assert!(text.contains("\"lessonId\": \"1-1\""));
    }
}
