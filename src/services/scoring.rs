// src/services/scoring.rs

use std::collections::HashMap;

use crate::{config::XP_PER_CORRECT_ANSWER, models::question::Question};

/// Counts the answers whose text exactly matches the question's correct option.
///
/// `answers` maps a question's position in `questions` to the selected text.
/// Positions outside the quiz are ignored. Matching is case-sensitive.
pub fn score(questions: &[Question], answers: &HashMap<usize, String>) -> i64 {
    answers
        .iter()
        .filter(|(index, selected)| {
            questions
                .get(**index)
                .is_some_and(|q| q.correct_option == **selected)
        })
        .count() as i64
}

/// XP earned for a score.
pub fn xp_for(score: i64) -> i64 {
    score * XP_PER_CORRECT_ANSWER
}
