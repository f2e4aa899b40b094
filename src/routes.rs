// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, leaderboard, profile, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Upper bound for uploaded documents.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, results, leaderboard).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/questions", get(quiz::get_questions))
        // Protected quiz routes (generation spends the model quota)
        .merge(
            Router::new()
                .route("/generate", post(quiz::generate_quiz))
                .route(
                    "/upload",
                    post(quiz::upload_quiz).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
                )
                .route("/{id}/attempts", post(quiz::submit_attempt))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/quizzes", get(quiz::list_quizzes))
        .nest("/api/quizzes", quiz_routes)
        .route("/api/results", get(quiz::list_results))
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .route(
            "/api/me",
            get(profile::get_me).layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
