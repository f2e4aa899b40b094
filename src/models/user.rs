// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
/// Aggregate stats are mutated only through `UserStore::apply_attempt`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub email: String,

    /// Identity of this user in the remote leaderboard store, once bound.
    pub remote_uid: Option<String>,

    pub total_xp: i64,
    pub quizzes_completed: i64,
    pub total_score: i64,

    /// `total_score / quizzes_completed`, recomputed on every attempt.
    pub average_score: f64,

    pub highest_score: i64,

    pub created_at: DateTime<Utc>,
}

/// DTO for user login. Unknown usernames are registered on first login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Email address is not valid."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be at least 6 characters."
    ))]
    pub password: String,
}

/// Profile and standing of the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    /// Rank by total XP in the remote leaderboard, if the user is bound to it.
    pub rank: Option<usize>,
}
