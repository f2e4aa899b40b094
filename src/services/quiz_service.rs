// src/services/quiz_service.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::{
    models::{
        quiz::{Difficulty, NewQuiz, Quiz},
        result::{AttemptResult, NewAttempt},
        user::User,
    },
    services::{
        extractor::{ContentExtractor, ContentSource, ExtractionError},
        orchestrator::{GenerationError, QuizGenerator},
        scoring,
        stats_sync::{StatsSynchronizer, SyncWarning},
    },
    store::{QuizStore, StoreError, UserStore},
};

const DEFAULT_QUIZ_TITLE: &str = "Generated Quiz";
const GENERATED_QUIZ_TYPE: &str = "Generated";
const MCQ_FORMAT: &str = "MCQ";

/// Everything needed to generate one quiz.
#[derive(Debug, Clone)]
pub struct CreateQuiz {
    pub source: ContentSource,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub result: AttemptResult,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_warning: Option<SyncWarning>,
}

#[derive(Debug)]
pub enum QuizServiceError {
    Extraction(ExtractionError),
    Generation(GenerationError),
    Store(StoreError),
    QuizNotFound(i64),
}

impl fmt::Display for QuizServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizServiceError::Extraction(e) => write!(f, "{}", e),
            QuizServiceError::Generation(e) => write!(f, "{}", e),
            QuizServiceError::Store(e) => write!(f, "{}", e),
            QuizServiceError::QuizNotFound(id) => write!(f, "quiz {} not found", id),
        }
    }
}

impl std::error::Error for QuizServiceError {}

impl From<ExtractionError> for QuizServiceError {
    fn from(err: ExtractionError) -> Self {
        QuizServiceError::Extraction(err)
    }
}

impl From<GenerationError> for QuizServiceError {
    fn from(err: GenerationError) -> Self {
        QuizServiceError::Generation(err)
    }
}

impl From<StoreError> for QuizServiceError {
    fn from(err: StoreError) -> Self {
        QuizServiceError::Store(err)
    }
}

/// The content-to-quiz pipeline and the attempt path, wired to their stores.
#[derive(Clone)]
pub struct QuizService {
    extractor: ContentExtractor,
    generator: QuizGenerator,
    quizzes: QuizStore,
    users: UserStore,
    stats: Arc<StatsSynchronizer>,
}

impl QuizService {
    pub fn new(
        extractor: ContentExtractor,
        generator: QuizGenerator,
        quizzes: QuizStore,
        users: UserStore,
        stats: Arc<StatsSynchronizer>,
    ) -> Self {
        Self {
            extractor,
            generator,
            quizzes,
            users,
            stats,
        }
    }

    /// Extracts, generates and saves a quiz. Nothing is written unless every
    /// batch succeeded.
    pub async fn create_quiz(&self, request: CreateQuiz) -> Result<Quiz, QuizServiceError> {
        let content = self.extractor.extract(&request.source).await?;
        tracing::info!(
            source = %request.source.descriptor(),
            chars = content.chars().count(),
            "Content extracted"
        );

        let questions = self
            .generator
            .generate(&content, request.difficulty, request.question_count)
            .await?;

        let header = NewQuiz {
            title: request
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_QUIZ_TITLE.to_string()),
            subject: request.source.descriptor(),
            difficulty: request.difficulty,
            quiz_type: GENERATED_QUIZ_TYPE.to_string(),
            format: MCQ_FORMAT.to_string(),
        };

        let quiz_id = self.quizzes.save_quiz(&header, &questions).await?;
        self.quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(QuizServiceError::QuizNotFound(quiz_id))
    }

    /// Scores a submission, stores the result and records it in the user's stats.
    pub async fn submit_attempt(
        &self,
        quiz_id: i64,
        username: &str,
        answers: &HashMap<usize, String>,
    ) -> Result<AttemptSummary, QuizServiceError> {
        if self.users.find_user(username).await?.is_none() {
            return Err(StoreError::UserNotFound(username.to_string()).into());
        }

        let questions = self.quizzes.get_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(QuizServiceError::QuizNotFound(quiz_id));
        }

        let score = scoring::score(&questions, answers);
        let xp_earned = scoring::xp_for(score);

        let result = self
            .quizzes
            .save_result(&NewAttempt {
                quiz_id,
                score,
                total: questions.len() as i64,
                xp_earned,
            })
            .await?;

        let record = self.stats.record_attempt(username, score, xp_earned).await?;
        tracing::info!(quiz_id, username, score, xp_earned, "Attempt recorded");

        Ok(AttemptSummary {
            result,
            user: record.user,
            sync_warning: record.sync.warning().cloned(),
        })
    }
}
