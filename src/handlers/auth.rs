// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::LoginRequest,
    services::session::SessionFlow,
    utils::jwt::sign_jwt,
};

/// Logs a user in and returns a JWT token.
///
/// Unknown usernames get a local row on first login. Credentials the identity
/// service rejects give 401. An unreachable identity service or a failed
/// profile sync comes back in `warnings` and the login still succeeds.
pub async fn login(
    State(session): State<Arc<SessionFlow>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = session
        .login(&payload.username, &payload.email, &payload.password)
        .await?;

    let token = sign_jwt(
        &outcome.user.username,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": outcome.user,
        "session": outcome.state,
        "warnings": outcome.warnings,
    })))
}
