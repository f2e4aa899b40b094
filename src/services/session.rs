// src/services/session.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    models::{leaderboard::RemoteProfile, user::User},
    services::{
        leaderboard_store::{LeaderboardStore, RemoteError},
        stats_sync::now_millis,
    },
    store::{StoreError, UserStore},
};

/// Where a login got to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated { remote_uid: String },
    ProfileSynced { remote_uid: String },
}

#[derive(Debug)]
pub enum IdentityError {
    /// The account exists (sign-up) or the credentials are wrong (sign-in).
    Rejected(String),
    Unavailable(String),
    NotConfigured,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::Rejected(msg) => write!(f, "identity service rejected the request: {}", msg),
            IdentityError::Unavailable(msg) => write!(f, "identity service unavailable: {}", msg),
            IdentityError::NotConfigured => write!(f, "no identity service configured"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Unavailable(err.to_string())
    }
}

/// Remote account service. Both calls return the remote uid.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, IdentityError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, IdentityError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
}

/// Identity-toolkit style REST provider (`accounts:signUp`, `accounts:signInWithPassword`).
#[derive(Clone)]
pub struct RestIdentityProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl RestIdentityProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://identitytoolkit.googleapis.com/v1";

    pub fn new(api_key: String) -> Result<Self, IdentityError> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, IdentityError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(&self, action: &str, email: &str, password: &str) -> Result<String, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, action);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&CredentialsBody {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(status.to_string()));
        }

        let account: AccountResponse = response.json().await?;
        Ok(account.local_id)
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        self.call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        self.call("signInWithPassword", email, password).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    pub state: SessionState,
    /// Non-fatal problems with the remote steps.
    pub warnings: Vec<String>,
}

/// Drives one login through {Unauthenticated → Authenticating → Authenticated → ProfileSynced}.
///
/// The local user row is always created first. Rejected credentials fail the
/// login; any other remote problem is best effort and the steps can be retried
/// individually with `authenticate` and `sync_profile`.
pub struct SessionFlow {
    users: UserStore,
    identity: Option<Arc<dyn IdentityProvider>>,
    leaderboard: Option<Arc<dyn LeaderboardStore>>,
}

impl SessionFlow {
    pub fn new(
        users: UserStore,
        identity: Option<Arc<dyn IdentityProvider>>,
        leaderboard: Option<Arc<dyn LeaderboardStore>>,
    ) -> Self {
        Self {
            users,
            identity,
            leaderboard,
        }
    }

    pub async fn login(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, SessionError> {
        let mut user = self.users.ensure_user(username, email).await?;
        let mut warnings = Vec::new();

        let state = match &self.identity {
            None => SessionState::Unauthenticated,
            Some(_) => {
                tracing::debug!(username, state = ?SessionState::Authenticating, "Session transition");
                match self.authenticate(&user, password).await {
                    Ok(uid) => {
                        user.remote_uid = Some(uid.clone());
                        SessionState::Authenticated { remote_uid: uid }
                    }
                    Err(SessionError::Identity(IdentityError::Rejected(reason))) => {
                        tracing::warn!(username, %reason, "Credentials rejected");
                        return Err(IdentityError::Rejected(reason).into());
                    }
                    Err(e) => {
                        tracing::warn!(username, error = %e, "Remote authentication failed");
                        warnings.push(e.to_string());
                        SessionState::Unauthenticated
                    }
                }
            }
        };

        let state = match state {
            SessionState::Authenticated { remote_uid } => {
                match self.sync_profile(&user, &remote_uid).await {
                    Ok(()) => SessionState::ProfileSynced { remote_uid },
                    Err(e) => {
                        tracing::warn!(username, error = %e, "Profile sync failed");
                        warnings.push(e.to_string());
                        SessionState::Authenticated { remote_uid }
                    }
                }
            }
            other => other,
        };

        tracing::info!(username, ?state, "Login finished");
        Ok(LoginOutcome {
            user,
            state,
            warnings,
        })
    }

    /// Signs up, falling back to sign-in, then binds the remote uid to the local user.
    pub async fn authenticate(&self, user: &User, password: &str) -> Result<String, SessionError> {
        let identity = self.identity.as_ref().ok_or(IdentityError::NotConfigured)?;

        let uid = match identity.sign_up(&user.email, password).await {
            Ok(uid) => uid,
            Err(IdentityError::Rejected(reason)) => {
                tracing::debug!(username = %user.username, %reason, "Sign-up rejected, trying sign-in");
                identity.sign_in(&user.email, password).await?
            }
            Err(e) => return Err(e.into()),
        };

        self.users.bind_remote_uid(&user.username, &uid).await?;
        Ok(uid)
    }

    /// Creates the remote snapshot if absent, otherwise refreshes its identity
    /// fields. Remote counters are left alone.
    pub async fn sync_profile(&self, user: &User, remote_uid: &str) -> Result<(), SessionError> {
        let Some(store) = &self.leaderboard else {
            return Ok(());
        };

        let now = now_millis();
        let profile = match store.fetch_profile(remote_uid).await? {
            Some(existing) => RemoteProfile {
                user_id: remote_uid.to_string(),
                username: user.username.clone(),
                email: user.email.clone(),
                updated_at: now,
                ..existing
            },
            None => RemoteProfile {
                user_id: remote_uid.to_string(),
                username: user.username.clone(),
                email: user.email.clone(),
                created_at: now,
                updated_at: now,
                ..Default::default()
            },
        };

        store.put_profile(remote_uid, &profile).await?;
        Ok(())
    }
}

/// Failure of one remote session step.
#[derive(Debug)]
pub enum SessionError {
    Identity(IdentityError),
    Remote(RemoteError),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Identity(e) => write!(f, "{}", e),
            SessionError::Remote(e) => write!(f, "{}", e),
            SessionError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SessionError::Identity(IdentityError::Rejected(_)))
    }
}

impl From<IdentityError> for SessionError {
    fn from(err: IdentityError) -> Self {
        SessionError::Identity(err)
    }
}

impl From<RemoteError> for SessionError {
    fn from(err: RemoteError) -> Self {
        SessionError::Remote(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}
