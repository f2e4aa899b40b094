// src/handlers/leaderboard.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::leaderboard::LeaderboardParams,
    services::stats_sync::{DEFAULT_LEADERBOARD_LIMIT, StatsSynchronizer},
};

/// Ranked users, sorted by `metric` (xp, average or completed).
pub async fn get_leaderboard(
    State(stats): State<Arc<StatsSynchronizer>>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(DEFAULT_LEADERBOARD_LIMIT);

    let entries = stats.leaderboard(params.metric, limit).await?;
    Ok(Json(entries))
}
