// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{
    services::{
        extractor::ExtractionError,
        orchestrator::GenerationError,
        quiz_service::QuizServiceError,
        session::SessionError,
        stats_sync::SyncReadError,
    },
    store::StoreError,
};

/// Global Application Error Enum.
/// Each domain failure class maps to one status and one actionable message.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity (source had nothing to quiz on)
    Unprocessable(String),

    // 429 Too Many Requests (generation quota exhausted)
    TooManyRequests(String),

    // 502 Bad Gateway (an upstream dependency failed)
    BadGateway(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(name) => {
                AppError::NotFound(format!("User '{}' not found. Log in first.", name))
            }
            StoreError::Database(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        tracing::warn!(error = %err, "Content extraction failed");
        match err {
            ExtractionError::InvalidSource(_) => {
                AppError::BadRequest("Only http:// and https:// URLs can be used as a source.".to_string())
            }
            ExtractionError::Unreachable(_) => {
                AppError::BadGateway("The source could not be fetched. Check the URL and try again.".to_string())
            }
            ExtractionError::Decode(_) => {
                AppError::BadRequest("The document could not be read. Upload a PDF, HTML or text file.".to_string())
            }
            ExtractionError::NoContent => {
                AppError::Unprocessable("The source contains no readable text.".to_string())
            }
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        tracing::warn!(error = %err, "Quiz generation failed");
        match err {
            GenerationError::InvalidCount(n) => {
                AppError::BadRequest(format!("Cannot generate {} questions.", n))
            }
            ref e if e.is_quota() => AppError::TooManyRequests(
                "The question generator is over its quota. Try again in a minute.".to_string(),
            ),
            GenerationError::BatchFailed { .. } => AppError::BadGateway(
                "The question generator did not return usable questions. Try again.".to_string(),
            ),
        }
    }
}

impl From<QuizServiceError> for AppError {
    fn from(err: QuizServiceError) -> Self {
        match err {
            QuizServiceError::Extraction(e) => e.into(),
            QuizServiceError::Generation(e) => e.into(),
            QuizServiceError::Store(e) => e.into(),
            QuizServiceError::QuizNotFound(id) => AppError::NotFound(format!("Quiz {} not found", id)),
        }
    }
}

impl From<SyncReadError> for AppError {
    fn from(err: SyncReadError) -> Self {
        match err {
            SyncReadError::Remote(e) => {
                tracing::warn!(error = %e, "Leaderboard read failed");
                AppError::BadGateway("The leaderboard is unavailable right now.".to_string())
            }
            SyncReadError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(e) => e.into(),
            e if e.is_rejected() => {
                AppError::AuthError("Invalid email or password".to_string())
            }
            e => {
                tracing::warn!(error = %e, "Session step failed");
                AppError::BadGateway("The account service is unavailable right now.".to_string())
            }
        }
    }
}
