// src/models/result.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'results' table in the database.
/// One row per completed, submitted or timed-out attempt. Never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptResult {
    pub id: i64,
    pub quiz_id: i64,
    pub score: i64,
    pub total: i64,
    pub xp_earned: i64,
    pub created_at: DateTime<Utc>,
}

/// An attempt about to be appended to the results table.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub score: i64,
    pub total: i64,
    pub xp_earned: i64,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// User's answers map.
    /// Key: question position in the quiz (0-based)
    /// Value: the text of the selected option
    pub answers: HashMap<usize, String>,
}
