// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// Character budget for extracted content handed to the prompt.
pub const MAX_CONTENT_CHARS: usize = 32_000;

/// Timeout for fetching a web page, in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 15;

/// Paragraph-like blocks shorter than this are ignored by the page fallback.
pub const MIN_PARAGRAPH_CHARS: usize = 40;

/// Maximum number of questions requested from the model in one call.
pub const QUESTION_BATCH_SIZE: usize = 10;

/// Attempts per batch before the whole generation is abandoned.
pub const MAX_BATCH_ATTEMPTS: usize = 3;

/// Cooldown after a quota/rate-limit signal, in seconds.
pub const QUOTA_COOLDOWN_SECS: u64 = 60;

/// Base of the exponential backoff (`base * 2^attempt`), in seconds.
pub const BACKOFF_BASE_SECS: u64 = 1;

/// Pause between consecutive batches, in seconds.
pub const BATCH_DELAY_SECS: u64 = 2;

pub const MIN_QUESTIONS_PER_QUIZ: usize = 1;
pub const MAX_QUESTIONS_PER_QUIZ: usize = 100;

/// XP awarded per correct answer.
pub const XP_PER_CORRECT_ANSWER: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Base URL of the remote leaderboard store. Remote sync is disabled when unset.
    pub leaderboard_url: Option<String>,
    pub leaderboard_auth: Option<String>,
    /// Key for the remote identity service. Remote sign-in is disabled when unset.
    pub identity_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .expect("BIND_ADDR must be a socket address");

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .expect("GEMINI_API_KEY must be set");

        let gemini_model = env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            gemini_api_key,
            gemini_model,
            leaderboard_url: non_empty_var("LEADERBOARD_URL"),
            leaderboard_auth: non_empty_var("LEADERBOARD_AUTH"),
            identity_api_key: non_empty_var("IDENTITY_API_KEY"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
