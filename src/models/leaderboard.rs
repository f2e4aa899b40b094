// src/models/leaderboard.rs

use serde::{Deserialize, Serialize};

/// A user snapshot as kept in the remote leaderboard store.
/// Missing fields decode to their defaults, mirroring how the store is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteProfile {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub quizzes_completed: i64,
    pub average_score: f64,
    pub highest_score: i64,
    pub total_score: i64,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
}

/// One ranked row of a leaderboard. The rank is assigned at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub total_xp: i64,
    pub quizzes_completed: i64,
    pub average_score: f64,
    pub rank: usize,
}

/// Metric a leaderboard is sorted by (descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LeaderboardMetric {
    #[default]
    #[serde(rename = "xp")]
    TotalXp,
    #[serde(rename = "average")]
    AverageScore,
    #[serde(rename = "completed")]
    QuizzesCompleted,
}

/// Query parameters for the leaderboard endpoint.
#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub metric: LeaderboardMetric,
    pub limit: Option<usize>,
}
