// src/services/stats_sync.rs

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::{
    models::{
        leaderboard::{LeaderboardEntry, LeaderboardMetric, RemoteProfile},
        user::User,
    },
    services::leaderboard_store::{LeaderboardStore, RemoteError},
    store::{StoreError, UserStore, user_store::average},
    utils::keyed_lock::KeyedLocks,
};

/// Default number of rows in a leaderboard.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 100;

/// The remote push failed. The local update still stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncWarning {
    pub message: String,
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leaderboard sync failed: {}", self.message)
    }
}

/// What happened to the remote replica during `record_attempt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Pushed,
    /// No remote store configured, or the user has no remote identity.
    Skipped,
    Warning(SyncWarning),
}

impl SyncStatus {
    pub fn warning(&self) -> Option<&SyncWarning> {
        match self {
            SyncStatus::Warning(w) => Some(w),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The user row after the local update.
    pub user: User,
    pub sync: SyncStatus,
}

/// Owns aggregate user stats: the local row is authoritative, the remote
/// snapshot is re-derived from its own counters on every push.
pub struct StatsSynchronizer {
    users: UserStore,
    remote: Option<Arc<dyn LeaderboardStore>>,
    locks: KeyedLocks,
}

impl StatsSynchronizer {
    pub fn new(users: UserStore, remote: Option<Arc<dyn LeaderboardStore>>) -> Self {
        Self {
            users,
            remote,
            locks: KeyedLocks::new(),
        }
    }

    /// Adds one attempt to the user's stats, locally and then remotely.
    ///
    /// Calls for the same username run one at a time. A missing user is an
    /// error; a failed remote push is reported in `sync` and logged.
    pub async fn record_attempt(
        &self,
        username: &str,
        score: i64,
        xp_earned: i64,
    ) -> Result<AttemptRecord, StoreError> {
        let _guard = self.locks.lock(username).await;

        let user = self.users.apply_attempt(username, score, xp_earned).await?;
        tracing::info!(
            username,
            score,
            xp_earned,
            quizzes_completed = user.quizzes_completed,
            "Local stats updated"
        );

        let sync = self.push_attempt(&user, score, xp_earned).await;
        Ok(AttemptRecord { user, sync })
    }

    async fn push_attempt(&self, user: &User, score: i64, xp_earned: i64) -> SyncStatus {
        let (Some(remote), Some(uid)) = (&self.remote, user.remote_uid.as_deref()) else {
            tracing::debug!(username = %user.username, "No remote identity bound, skipping leaderboard sync");
            return SyncStatus::Skipped;
        };

        let pushed = async {
            let current = remote.fetch_profile(uid).await?.unwrap_or_default();
            let updated = apply_attempt_to_profile(current, user, uid, score, xp_earned, now_millis());
            remote.put_profile(uid, &updated).await
        }
        .await;

        match pushed {
            Ok(()) => {
                tracing::info!(username = %user.username, uid, "Leaderboard synced");
                SyncStatus::Pushed
            }
            Err(e) => {
                tracing::warn!(username = %user.username, uid, error = %e, "Leaderboard sync failed");
                SyncStatus::Warning(SyncWarning {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Ranked leaderboard by `metric`, at most `limit` rows.
    ///
    /// Reads every remote snapshot; without a remote store the local users are ranked.
    pub async fn leaderboard(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, SyncReadError> {
        let profiles = self.snapshots().await?;
        Ok(rank_profiles(profiles, metric, limit))
    }

    /// Position of `uid` on the full XP leaderboard, so ties rank exactly as
    /// `leaderboard(TotalXp, _)` shows them.
    pub async fn user_rank(&self, uid: &str) -> Result<Option<usize>, SyncReadError> {
        let profiles = self.snapshots().await?;
        Ok(rank_profiles(profiles, LeaderboardMetric::TotalXp, usize::MAX)
            .into_iter()
            .find(|entry| entry.user_id == uid)
            .map(|entry| entry.rank))
    }

    /// Rank of a local user in whichever leaderboard `leaderboard` reads.
    pub async fn rank_of(&self, user: &User) -> Result<Option<usize>, SyncReadError> {
        let key = match (&self.remote, &user.remote_uid) {
            (Some(_), Some(uid)) => uid.clone(),
            (Some(_), None) => return Ok(None),
            (None, _) => local_key(user),
        };
        self.user_rank(&key).await
    }

    async fn snapshots(&self) -> Result<Vec<RemoteProfile>, SyncReadError> {
        match &self.remote {
            Some(remote) => Ok(remote.fetch_all().await?),
            None => Ok(self
                .users
                .list_users()
                .await?
                .iter()
                .map(local_profile)
                .collect()),
        }
    }
}

/// Failure of a leaderboard read.
#[derive(Debug)]
pub enum SyncReadError {
    Remote(RemoteError),
    Store(StoreError),
}

impl fmt::Display for SyncReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncReadError::Remote(e) => write!(f, "{}", e),
            SyncReadError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncReadError {}

impl From<RemoteError> for SyncReadError {
    fn from(err: RemoteError) -> Self {
        SyncReadError::Remote(err)
    }
}

impl From<StoreError> for SyncReadError {
    fn from(err: StoreError) -> Self {
        SyncReadError::Store(err)
    }
}

/// Applies one attempt to a remote snapshot using the snapshot's own counters.
///
/// Identity fields are refreshed from the local user; `created_at` is kept
/// unless the snapshot is new.
pub fn apply_attempt_to_profile(
    current: RemoteProfile,
    user: &User,
    uid: &str,
    score: i64,
    xp_earned: i64,
    now_millis: i64,
) -> RemoteProfile {
    let quizzes_completed = current.quizzes_completed + 1;
    let total_score = current.total_score + score;

    RemoteProfile {
        user_id: uid.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        total_xp: current.total_xp + xp_earned,
        quizzes_completed,
        average_score: average(total_score, quizzes_completed),
        highest_score: current.highest_score.max(score),
        total_score,
        created_at: if current.created_at > 0 {
            current.created_at
        } else {
            now_millis
        },
        updated_at: now_millis,
    }
}

/// Sorts descending by `metric`, keeps the first `limit`, and assigns
/// 1-based ranks by position. Ties keep their input order.
pub fn rank_profiles(
    mut profiles: Vec<RemoteProfile>,
    metric: LeaderboardMetric,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    profiles.sort_by(|a, b| compare_desc(a, b, metric));

    profiles
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            user_id: p.user_id,
            username: p.username,
            total_xp: p.total_xp,
            quizzes_completed: p.quizzes_completed,
            average_score: p.average_score,
            rank: i + 1,
        })
        .collect()
}

fn compare_desc(a: &RemoteProfile, b: &RemoteProfile, metric: LeaderboardMetric) -> Ordering {
    match metric {
        LeaderboardMetric::TotalXp => b.total_xp.cmp(&a.total_xp),
        LeaderboardMetric::AverageScore => b.average_score.total_cmp(&a.average_score),
        LeaderboardMetric::QuizzesCompleted => b.quizzes_completed.cmp(&a.quizzes_completed),
    }
}

/// Projects a local user into the snapshot shape used for ranking.
fn local_profile(user: &User) -> RemoteProfile {
    RemoteProfile {
        user_id: local_key(user),
        username: user.username.clone(),
        email: user.email.clone(),
        total_xp: user.total_xp,
        quizzes_completed: user.quizzes_completed,
        average_score: user.average_score,
        highest_score: user.highest_score,
        total_score: user.total_score,
        created_at: user.created_at.timestamp_millis(),
        updated_at: user.created_at.timestamp_millis(),
    }
}

fn local_key(user: &User) -> String {
    user.remote_uid.clone().unwrap_or_else(|| user.id.to_string())
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, xp: i64, avg: f64, done: i64) -> RemoteProfile {
        RemoteProfile {
            user_id: id.to_string(),
            username: id.to_string(),
            total_xp: xp,
            average_score: avg,
            quizzes_completed: done,
            ..Default::default()
        }
    }

    fn user(uid: &str) -> User {
        User {
            id: 1,
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            remote_uid: Some(uid.to_string()),
            total_xp: 0,
            quizzes_completed: 0,
            total_score: 0,
            average_score: 0.0,
            highest_score: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_by_requested_metric_with_dense_positions() {
        let profiles = vec![
            profile("a", 50, 9.0, 1),
            profile("b", 300, 3.0, 7),
            profile("c", 120, 6.5, 4),
        ];

        let by_xp = rank_profiles(profiles.clone(), LeaderboardMetric::TotalXp, 10);
        let order: Vec<_> = by_xp.iter().map(|e| (e.user_id.as_str(), e.rank)).collect();
        assert_eq!(order, vec![("b", 1), ("c", 2), ("a", 3)]);

        let by_avg = rank_profiles(profiles.clone(), LeaderboardMetric::AverageScore, 10);
        assert_eq!(by_avg[0].user_id, "a");

        let by_done = rank_profiles(profiles, LeaderboardMetric::QuizzesCompleted, 2);
        assert_eq!(by_done.len(), 2);
        assert_eq!(by_done[1].user_id, "c");
        assert_eq!(by_done[1].rank, 2);
    }

    #[test]
    fn ties_get_distinct_consecutive_ranks() {
        let profiles = vec![profile("a", 10, 0.0, 0), profile("b", 10, 0.0, 0)];
        let ranked = rank_profiles(profiles, LeaderboardMetric::TotalXp, 10);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[0].user_id, "a");
    }

    #[test]
    fn remote_snapshot_uses_its_own_counters() {
        let current = RemoteProfile {
            user_id: "uid-1".into(),
            total_xp: 100,
            quizzes_completed: 3,
            total_score: 12,
            highest_score: 6,
            created_at: 1_000,
            ..Default::default()
        };

        let updated = apply_attempt_to_profile(current, &user("uid-1"), "uid-1", 8, 80, 5_000);

        assert_eq!(updated.total_xp, 180);
        assert_eq!(updated.quizzes_completed, 4);
        assert_eq!(updated.total_score, 20);
        assert!((updated.average_score - 5.0).abs() < f64::EPSILON);
        assert_eq!(updated.highest_score, 8);
        assert_eq!(updated.created_at, 1_000);
        assert_eq!(updated.updated_at, 5_000);
        assert_eq!(updated.username, "ann");
    }

    #[test]
    fn empty_snapshot_starts_from_zero() {
        let updated = apply_attempt_to_profile(RemoteProfile::default(), &user("u"), "u", 3, 30, 42);
        assert_eq!(updated.user_id, "u");
        assert_eq!(updated.quizzes_completed, 1);
        assert_eq!(updated.created_at, 42);
        assert!((updated.average_score - 3.0).abs() < f64::EPSILON);
    }
}
