// src/store/user_store.rs

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{models::user::User, store::StoreError};

const USER_COLUMNS: &str = "id, username, email, remote_uid, total_xp, quizzes_completed, \
     total_score, average_score, highest_score, created_at";

/// Local, authoritative store of users and their aggregate stats.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the user with this username, creating it with zeroed stats if absent.
    pub async fn ensure_user(&self, username: &str, email: &str) -> Result<User, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO users (username, email, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(username) DO NOTHING",
        )
        .bind(username)
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            tracing::info!(username, "Registered new local user");
        }

        self.find_user(username)
            .await?
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Records the remote identity of a user.
    pub async fn bind_remote_uid(&self, username: &str, remote_uid: &str) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE users SET remote_uid = ? WHERE username = ?")
            .bind(remote_uid)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(username.to_string()));
        }
        Ok(())
    }

    /// Adds one attempt to the user's aggregate stats and returns the updated row.
    ///
    /// The counters are incremented in place, then the average and highest
    /// score are recomputed from the incremented row and written back, all in
    /// one transaction. Callers serialize concurrent calls per username.
    pub async fn apply_attempt(
        &self,
        username: &str,
        score: i64,
        xp_earned: i64,
    ) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let incremented = sqlx::query(
            r#"
            UPDATE users
            SET total_xp = total_xp + ?,
                quizzes_completed = quizzes_completed + 1,
                total_score = total_score + ?
            WHERE username = ?
            "#,
        )
        .bind(xp_earned)
        .bind(score)
        .bind(username)
        .execute(&mut *tx)
        .await?;

        if incremented.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(username.to_string()));
        }

        let mut user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;

        user.average_score = average(user.total_score, user.quizzes_completed);
        user.highest_score = user.highest_score.max(score);

        sqlx::query("UPDATE users SET average_score = ?, highest_score = ? WHERE id = ?")
            .bind(user.average_score)
            .bind(user.highest_score)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }
}

/// `total / count`, or zero before the first attempt.
pub fn average(total: i64, count: i64) -> f64 {
    if count > 0 {
        total as f64 / count as f64
    } else {
        0.0
    }
}
