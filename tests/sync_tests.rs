// tests/sync_tests.rs

use std::sync::Arc;

use async_trait::async_trait;
use quizgen::{
    models::leaderboard::{LeaderboardMetric, RemoteProfile},
    services::{
        leaderboard_store::{InMemoryLeaderboardStore, LeaderboardStore, RemoteError},
        stats_sync::{StatsSynchronizer, SyncStatus},
    },
    store::{self, StoreError, UserStore},
};

/// A leaderboard store whose network is down.
struct OfflineStore;

#[async_trait]
impl LeaderboardStore for OfflineStore {
    async fn fetch_profile(&self, _uid: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        Err(RemoteError::Unavailable("network down".to_string()))
    }

    async fn put_profile(&self, _uid: &str, _profile: &RemoteProfile) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("network down".to_string()))
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteProfile>, RemoteError> {
        Err(RemoteError::Unavailable("network down".to_string()))
    }
}

async fn users() -> UserStore {
    let pool = store::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    UserStore::new(pool)
}

async fn bound_user(users: &UserStore, name: &str, uid: &str) {
    users.ensure_user(name, &format!("{name}@example.com")).await.unwrap();
    users.bind_remote_uid(name, uid).await.unwrap();
}

#[tokio::test]
async fn attempt_updates_local_and_remote() {
    let users = users().await;
    bound_user(&users, "ann", "uid-ann").await;
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    let sync = StatsSynchronizer::new(users.clone(), Some(remote.clone()));

    let record = sync.record_attempt("ann", 4, 40).await.unwrap();
    assert_eq!(record.sync, SyncStatus::Pushed);
    assert_eq!(record.user.quizzes_completed, 1);

    let snapshot = remote.fetch_profile("uid-ann").await.unwrap().unwrap();
    assert_eq!(snapshot.total_xp, 40);
    assert_eq!(snapshot.quizzes_completed, 1);
    assert_eq!(snapshot.highest_score, 4);
    assert_eq!(snapshot.username, "ann");
}

#[tokio::test]
async fn remote_failure_is_a_warning_and_local_still_counts() {
    let users = users().await;
    bound_user(&users, "bob", "uid-bob").await;
    let sync = StatsSynchronizer::new(users.clone(), Some(Arc::new(OfflineStore)));

    let record = sync.record_attempt("bob", 2, 20).await.unwrap();

    let warning = record.sync.warning().expect("push failure should be reported");
    assert!(warning.message.contains("network down"));
    let stored = users.find_user("bob").await.unwrap().unwrap();
    assert_eq!(stored.quizzes_completed, 1);
    assert_eq!(stored.total_xp, 20);
}

#[tokio::test]
async fn unbound_user_skips_remote_push() {
    let users = users().await;
    users.ensure_user("cat", "cat@example.com").await.unwrap();
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    let sync = StatsSynchronizer::new(users, Some(remote.clone()));

    let record = sync.record_attempt("cat", 1, 10).await.unwrap();

    assert_eq!(record.sync, SyncStatus::Skipped);
    assert!(remote.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_user_is_fatal() {
    let sync = StatsSynchronizer::new(users().await, None);
    let err = sync.record_attempt("nobody", 1, 10).await;
    assert!(matches!(err, Err(StoreError::UserNotFound(_))));
}

#[tokio::test]
async fn remote_counters_drift_independently() {
    let users = users().await;
    bound_user(&users, "dan", "uid-dan").await;
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    remote
        .put_profile(
            "uid-dan",
            &RemoteProfile {
                user_id: "uid-dan".into(),
                total_xp: 500,
                quizzes_completed: 9,
                total_score: 45,
                highest_score: 9,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let sync = StatsSynchronizer::new(users, Some(remote.clone()));

    let record = sync.record_attempt("dan", 5, 50).await.unwrap();

    assert_eq!(record.user.total_xp, 50);
    let snapshot = remote.fetch_profile("uid-dan").await.unwrap().unwrap();
    assert_eq!(snapshot.total_xp, 550);
    assert_eq!(snapshot.quizzes_completed, 10);
    assert!((snapshot.average_score - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn concurrent_attempts_for_one_user_are_not_lost() {
    let users = users().await;
    bound_user(&users, "eve", "uid-eve").await;
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    let sync = Arc::new(StatsSynchronizer::new(users.clone(), Some(remote.clone())));

    let handles: Vec<_> = (1..=8)
        .map(|score| {
            let sync = sync.clone();
            tokio::spawn(async move { sync.record_attempt("eve", score, score * 10).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = users.find_user("eve").await.unwrap().unwrap();
    assert_eq!(stored.quizzes_completed, 8);
    assert_eq!(stored.total_score, 36);
    assert_eq!(stored.highest_score, 8);

    let snapshot = remote.fetch_profile("uid-eve").await.unwrap().unwrap();
    assert_eq!(snapshot.quizzes_completed, 8);
    assert_eq!(snapshot.total_xp, 360);
}

#[tokio::test]
async fn leaderboard_ranks_remote_snapshots() {
    let users = users().await;
    bound_user(&users, "ann", "uid-ann").await;
    bound_user(&users, "bob", "uid-bob").await;
    bound_user(&users, "cat", "uid-cat").await;
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    let sync = StatsSynchronizer::new(users.clone(), Some(remote));

    sync.record_attempt("ann", 2, 20).await.unwrap();
    sync.record_attempt("bob", 9, 90).await.unwrap();
    sync.record_attempt("cat", 5, 50).await.unwrap();
    sync.record_attempt("cat", 5, 50).await.unwrap();

    let board = sync.leaderboard(LeaderboardMetric::TotalXp, 2).await.unwrap();
    let names: Vec<_> = board.iter().map(|e| (e.username.as_str(), e.rank)).collect();
    assert_eq!(names, vec![("cat", 1), ("bob", 2)]);

    let by_avg = sync.leaderboard(LeaderboardMetric::AverageScore, 10).await.unwrap();
    assert_eq!(by_avg[0].username, "bob");

    assert_eq!(sync.user_rank("uid-ann").await.unwrap(), Some(3));
    assert_eq!(sync.user_rank("uid-bob").await.unwrap(), Some(2));
    assert_eq!(sync.user_rank("unknown").await.unwrap(), None);
}

#[tokio::test]
async fn tied_users_rank_as_the_board_shows_them() {
    let users = users().await;
    bound_user(&users, "ann", "uid-ann").await;
    bound_user(&users, "bob", "uid-bob").await;
    let remote = Arc::new(InMemoryLeaderboardStore::new());
    let sync = StatsSynchronizer::new(users.clone(), Some(remote));

    sync.record_attempt("ann", 4, 40).await.unwrap();
    sync.record_attempt("bob", 4, 40).await.unwrap();

    let board = sync.leaderboard(LeaderboardMetric::TotalXp, 10).await.unwrap();
    for entry in &board {
        assert_eq!(sync.user_rank(&entry.user_id).await.unwrap(), Some(entry.rank));
    }
    let ranks: Vec<usize> = board.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2]);
}

#[tokio::test]
async fn leaderboard_falls_back_to_local_users() {
    let users = users().await;
    users.ensure_user("ann", "ann@example.com").await.unwrap();
    users.ensure_user("bob", "bob@example.com").await.unwrap();
    let sync = StatsSynchronizer::new(users.clone(), None);

    sync.record_attempt("bob", 3, 30).await.unwrap();

    let board = sync.leaderboard(LeaderboardMetric::TotalXp, 10).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].username, "bob");
    assert_eq!(board[0].rank, 1);

    let ann = users.find_user("ann").await.unwrap().unwrap();
    assert_eq!(sync.rank_of(&ann).await.unwrap(), Some(2));
}
