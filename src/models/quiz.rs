// src/models/quiz.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::config::{MAX_QUESTIONS_PER_QUIZ, MIN_QUESTIONS_PER_QUIZ};

/// Difficulty requested for a generated quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
    #[serde(alias = "mixed")]
    Mixed,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct UnknownDifficulty(pub String);

impl fmt::Display for UnknownDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown difficulty '{}'", self.0)
    }
}

impl std::error::Error for UnknownDifficulty {}

impl TryFrom<String> for Difficulty {
    type Error = UnknownDifficulty;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "mixed" => Ok(Difficulty::Mixed),
            _ => Err(UnknownDifficulty(value)),
        }
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,

    /// Where the content came from: the topic, the URL or the document name.
    pub subject: String,

    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,

    pub total_questions: i64,

    /// Quiz type tag, e.g. "Generated".
    pub quiz_type: String,

    /// Quiz format tag, e.g. "MCQ".
    pub format: String,

    pub created_at: DateTime<Utc>,
}

/// Quiz header as handed to `QuizStore::save_quiz`.
/// The identity and question count are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub quiz_type: String,
    pub format: String,
}

/// DTO for generating a quiz from a topic or a web page.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_single_source))]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 2000))]
    pub topic: Option<String>,
    #[validate(url, length(max = 2000))]
    pub url: Option<String>,
    pub difficulty: Difficulty,
    #[validate(range(min = MIN_QUESTIONS_PER_QUIZ, max = MAX_QUESTIONS_PER_QUIZ))]
    pub question_count: usize,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
}

/// Exactly one of `topic` and `url` must be provided.
fn validate_single_source(req: &GenerateQuizRequest) -> Result<(), ValidationError> {
    match (&req.topic, &req.url) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        (None, None) => Err(ValidationError::new("source_required")),
        (Some(_), Some(_)) => Err(ValidationError::new("single_source_only")),
    }
}

/// Query parameters for generating a quiz from an uploaded document.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadQuizParams {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    pub difficulty: Difficulty,
    #[validate(range(min = MIN_QUESTIONS_PER_QUIZ, max = MAX_QUESTIONS_PER_QUIZ))]
    pub question_count: usize,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
}
