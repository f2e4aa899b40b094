// src/store/mod.rs

pub mod quiz_store;
pub mod user_store;

use std::fmt;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use quiz_store::QuizStore;
pub use user_store::UserStore;

/// Local persistence failure.
#[derive(Debug)]
pub enum StoreError {
    Database(String),

    /// Stats were recorded for a username with no row. Users must exist first.
    UserNotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "database error: {}", msg),
            StoreError::UserNotFound(name) => write!(f, "user '{}' does not exist", name),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Opens the local SQLite database and applies pending migrations.
///
/// An in-memory URL keeps a single connection alive for the pool's lifetime,
/// since every new connection to `:memory:` would see an empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = database_url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(pool)
}
