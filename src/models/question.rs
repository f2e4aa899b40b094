// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Option letters in display order.
pub const OPTION_KEYS: [&str; 4] = ["A", "B", "C", "D"];

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Owning quiz. Always set for stored questions.
    pub quiz_id: i64,

    pub question_text: String,

    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// The text of the correct option, not its letter.
    /// Scoring compares submitted text against this value.
    pub correct_option: String,

    pub hint: Option<String>,
}

/// A validated question produced by the generation pipeline.
/// It has no identity and no owning quiz until `QuizStore::save_quiz` persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub options: [String; 4],
    pub correct_option: String,
    pub hint: Option<String>,
}

/// DTO for sending a question to the client (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub options: [String; 4],
    pub hint: Option<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            quiz_id: q.quiz_id,
            question_text: q.question_text,
            options: [q.option_a, q.option_b, q.option_c, q.option_d],
            hint: q.hint,
        }
    }
}
