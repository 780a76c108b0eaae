//! Answer grading.
//!
//! Multiple choice compares option ids. Code answers (fill-blank, fix-code)
//! ignore case and whitespace layout but keep token boundaries: runs of
//! whitespace collapse to one space, and a space next to punctuation is
//! dropped, so `print( 'Hi' )` matches `print('hi')` while `printx` does not
//! match `print x`. Output predictions are compared trimmed and lower-cased,
//! with interior whitespace significant.

use crate::catalog::{Question, QuestionKind};

/// Normalize a code answer for comparison.
pub fn normalize_code(input: &str) -> String {
    let collapsed = input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let before = i.checked_sub(1).map(|j| chars[j]);
            let after = chars.get(i + 1).copied();
            if before.is_some_and(is_word_char) && after.is_some_and(is_word_char) {
                out.push(' ');
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Normalize a predicted program output for comparison.
pub fn normalize_output(input: &str) -> String {
    input.trim().to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `answer` is a correct response to `question`.
pub fn is_correct(question: &Question, answer: &str) -> bool {
    match question.kind {
        QuestionKind::Mcq => answer == question.correct_answer,
        QuestionKind::FillBlank | QuestionKind::FixCode => {
            normalize_code(answer) == normalize_code(&question.correct_answer)
        }
        QuestionKind::OutputPrediction => {
            normalize_output(answer) == normalize_output(&question.correct_answer)
        }
    }
}

/// Percentage of correct answers, rounded to the nearest integer.
pub fn accuracy(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// Star rating for a finished lesson: 3 for a perfect run, 2 from 80%, else 1.
pub fn stars(accuracy: u32) -> u8 {
    match accuracy {
        a if a >= 100 => 3,
        a if a >= 80 => 2,
        _ => 1,
    }
}
