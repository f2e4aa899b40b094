// src/services/leaderboard_store.rs

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use crate::models::leaderboard::RemoteProfile;

/// Failure talking to the remote leaderboard store.
#[derive(Debug)]
pub enum RemoteError {
    Unavailable(String),
    InvalidResponse(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Unavailable(msg) => write!(f, "leaderboard store unavailable: {}", msg),
            RemoteError::InvalidResponse(msg) => {
                write!(f, "leaderboard store sent an invalid response: {}", msg)
            }
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Unavailable(err.to_string())
        }
    }
}

/// Keyed collection of user snapshots, the best-effort replica behind the leaderboard.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<RemoteProfile>, RemoteError>;

    /// Overwrites the snapshot stored under `uid`.
    async fn put_profile(&self, uid: &str, profile: &RemoteProfile) -> Result<(), RemoteError>;

    /// Every snapshot that decodes. Entries that do not are skipped.
    async fn fetch_all(&self) -> Result<Vec<RemoteProfile>, RemoteError>;
}

/// Decodes the children of a `users` node, dropping (and logging) the ones that fail.
pub fn decode_profiles(node: Value) -> Vec<RemoteProfile> {
    let children: Vec<(String, Value)> = match node {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };

    children
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(key, value)| match serde_json::from_value::<RemoteProfile>(value) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping undecodable leaderboard entry");
                None
            }
        })
        .collect()
}

/// REST client for a realtime-database style store:
/// `GET/PUT {base}/users/{uid}.json` and `GET {base}/users.json`.
#[derive(Clone)]
pub struct RestLeaderboardStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RestLeaderboardStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url).map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    fn profile_url(&self, uid: &str) -> Result<Url, RemoteError> {
        if uid.is_empty() || uid.contains(&['/', '.', '#', '$', '[', ']'][..]) {
            return Err(RemoteError::Unavailable(format!("invalid remote uid '{}'", uid)));
        }
        self.endpoint(&format!("users/{}.json", uid))
    }
}

#[async_trait]
impl LeaderboardStore for RestLeaderboardStore {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        let response = self
            .client
            .get(self.profile_url(uid)?)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = response.json().await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn put_profile(&self, uid: &str, profile: &RemoteProfile) -> Result<(), RemoteError> {
        self.client
            .put(self.profile_url(uid)?)
            .json(profile)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteProfile>, RemoteError> {
        let response = self
            .client
            .get(self.endpoint("users.json")?)
            .send()
            .await?
            .error_for_status()?;

        let node: Value = response.json().await?;
        let profiles = decode_profiles(node);
        tracing::debug!(count = profiles.len(), "Loaded leaderboard profiles");
        Ok(profiles)
    }
}

/// Process-local store for tests and single-process setups.
#[derive(Default)]
pub struct InMemoryLeaderboardStore {
    profiles: RwLock<HashMap<String, RemoteProfile>>,
}

impl InMemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboardStore {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        Ok(self.profiles.read().await.get(uid).cloned())
    }

    async fn put_profile(&self, uid: &str, profile: &RemoteProfile) -> Result<(), RemoteError> {
        self.profiles
            .write()
            .await
            .insert(uid.to_string(), profile.clone());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteProfile>, RemoteError> {
        let mut profiles: Vec<RemoteProfile> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_skips_bad_entries_and_fills_defaults() {
        let node = json!({
            "u1": {"userId": "u1", "username": "ann", "totalXP": 120, "averageScore": 4.5},
            "u2": {"userId": "u2", "username": "bob", "totalXP": "lots"},
            "u3": null,
            "u4": "garbage"
        });

        let profiles = decode_profiles(node);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, "ann");
        assert_eq!(profiles[0].total_xp, 120);
        assert_eq!(profiles[0].quizzes_completed, 0);
    }

    #[test]
    fn decode_of_empty_node_is_empty() {
        assert!(decode_profiles(Value::Null).is_empty());
    }

    #[test]
    fn profile_urls_are_rooted_at_base() {
        let store = RestLeaderboardStore::new("https://db.example.com/root", Some("tok".into())).unwrap();
        let url = store.profile_url("abc123").unwrap();
        assert_eq!(url.as_str(), "https://db.example.com/root/users/abc123.json?auth=tok");
        assert!(store.profile_url("../x").is_err());
    }

    #[tokio::test]
    async fn in_memory_store_overwrites_by_uid() {
        let store = InMemoryLeaderboardStore::new();
        let mut profile = RemoteProfile {
            user_id: "u1".into(),
            total_xp: 10,
            ..Default::default()
        };
        store.put_profile("u1", &profile).await.unwrap();
        profile.total_xp = 30;
        store.put_profile("u1", &profile).await.unwrap();

        assert_eq!(store.fetch_profile("u1").await.unwrap().unwrap().total_xp, 30);
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
        assert!(store.fetch_profile("missing").await.unwrap().is_none());
    }
}
