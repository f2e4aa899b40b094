// src/main.rs

use dotenvy::dotenv;
use quizgen::config::Config;
use quizgen::routes;
use quizgen::state::{AppState, Collaborators};
use quizgen::store;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Open the local store and apply migrations
    let pool = store::connect(&config.database_url)
        .await
        .expect("Failed to open the local database");
    tracing::info!("Database ready, migrations applied.");

    let collaborators = Collaborators::from_config(&config).expect("Failed to build service clients");
    if collaborators.leaderboard.is_none() {
        tracing::info!("LEADERBOARD_URL not set, ranking local users only");
    }
    if collaborators.identity.is_none() {
        tracing::info!("IDENTITY_API_KEY not set, logins stay local");
    }

    let state = AppState::new(pool.clone(), config.clone(), collaborators)
        .expect("Failed to build application state");

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    pool.close().await;
    tracing::info!("Database closed, bye.");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
