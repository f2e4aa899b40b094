// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::PublicQuestion,
        quiz::{GenerateQuizRequest, UploadQuizParams},
        result::SubmitAttemptRequest,
    },
    services::{
        extractor::ContentSource,
        quiz_service::{CreateQuiz, QuizService},
    },
    store::QuizStore,
    utils::jwt::Claims,
};

/// Generates and saves a quiz from a topic or a web page.
pub async fn generate_quiz(
    State(service): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    tracing::info!(user = %claims.sub, count = payload.question_count, "Quiz generation requested");

    let source = match (payload.topic, payload.url) {
        (Some(topic), None) => ContentSource::Topic(topic),
        (None, Some(url)) => ContentSource::Url(url),
        _ => return Err(AppError::BadRequest("Provide exactly one of topic or url".to_string())),
    };

    let quiz = service
        .create_quiz(CreateQuiz {
            source,
            difficulty: payload.difficulty,
            question_count: payload.question_count,
            title: payload.title,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Generates and saves a quiz from an uploaded document (raw request body).
pub async fn upload_quiz(
    State(service): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<UploadQuizParams>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    tracing::info!(user = %claims.sub, file = %params.file_name, bytes = body.len(), "Document upload");

    if body.is_empty() {
        return Err(AppError::BadRequest("Uploaded document is empty".to_string()));
    }

    let quiz = service
        .create_quiz(CreateQuiz {
            source: ContentSource::Document {
                file_name: params.file_name,
                bytes: body.to_vec(),
            },
            difficulty: params.difficulty,
            question_count: params.question_count,
            title: params.title,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists all saved quizzes, newest first.
pub async fn list_quizzes(State(quizzes): State<QuizStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(quizzes.get_quizzes().await?))
}

pub async fn get_quiz(
    State(quizzes): State<QuizStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes
        .get_quiz(id)
        .await?
        .ok_or(AppError::NotFound(format!("Quiz {} not found", id)))?;

    Ok(Json(quiz))
}

/// Questions of a quiz in play order. Correct answers are not included.
pub async fn get_questions(
    State(quizzes): State<QuizStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if quizzes.get_quiz(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Quiz {} not found", id)));
    }

    let questions: Vec<PublicQuestion> = quizzes
        .get_questions(id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(questions))
}

/// Scores a submission for the current user and updates their stats.
///
/// A failed leaderboard push is returned as `sync_warning`; the attempt is
/// still recorded.
pub async fn submit_attempt(
    State(service): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = service
        .submit_attempt(id, &claims.sub, &payload.answers)
        .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Attempt history, newest first.
pub async fn list_results(State(quizzes): State<QuizStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(quizzes.get_results().await?))
}
