// src/handlers/profile.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError,
    models::user::MeResponse,
    services::stats_sync::StatsSynchronizer,
    store::UserStore,
    utils::jwt::Claims,
};

/// Get current user's stats and leaderboard rank.
///
/// An unreachable leaderboard only drops the rank from the response.
pub async fn get_me(
    State(users): State<UserStore>,
    State(stats): State<Arc<StatsSynchronizer>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = users
        .find_user(&claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let rank = match stats.rank_of(&user).await {
        Ok(rank) => rank,
        Err(e) => {
            tracing::warn!(username = %user.username, error = %e, "Could not compute rank");
            None
        }
    };

    Ok(Json(MeResponse { user, rank }))
}
