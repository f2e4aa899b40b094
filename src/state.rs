// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    config::{Config, FETCH_TIMEOUT_SECS},
    services::{
        extractor::ContentExtractor,
        generation::{GeminiClient, GenerationService},
        leaderboard_store::{LeaderboardStore, RestLeaderboardStore},
        orchestrator::{GenerationPolicy, QuizGenerator},
        quiz_service::QuizService,
        session::{IdentityProvider, RestIdentityProvider, SessionFlow},
        stats_sync::StatsSynchronizer,
    },
    store::{QuizStore, UserStore},
};

/// The outside services the app talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub generation: Arc<dyn GenerationService>,
    pub leaderboard: Option<Arc<dyn LeaderboardStore>>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub policy: GenerationPolicy,
}

impl Collaborators {
    /// Real clients for everything the config enables.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let generation = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())
            .map_err(|e| e.to_string())?;

        let leaderboard = match &config.leaderboard_url {
            Some(url) => {
                let store = RestLeaderboardStore::new(url, config.leaderboard_auth.clone())
                    .map_err(|e| e.to_string())?;
                Some(Arc::new(store) as Arc<dyn LeaderboardStore>)
            }
            None => None,
        };

        let identity = match &config.identity_api_key {
            Some(key) => {
                let provider = RestIdentityProvider::new(key.clone()).map_err(|e| e.to_string())?;
                Some(Arc::new(provider) as Arc<dyn IdentityProvider>)
            }
            None => None,
        };

        Ok(Self {
            generation: Arc::new(generation),
            leaderboard,
            identity,
            policy: GenerationPolicy::default(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub quizzes: QuizStore,
    pub users: UserStore,
    pub quiz_service: QuizService,
    pub stats: Arc<StatsSynchronizer>,
    pub session: Arc<SessionFlow>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, collaborators: Collaborators) -> Result<Self, String> {
        let quizzes = QuizStore::new(pool.clone());
        let users = UserStore::new(pool.clone());

        let extractor =
            ContentExtractor::new(Duration::from_secs(FETCH_TIMEOUT_SECS)).map_err(|e| e.to_string())?;
        let generator = QuizGenerator::new(collaborators.generation, collaborators.policy);

        let stats = Arc::new(StatsSynchronizer::new(
            users.clone(),
            collaborators.leaderboard.clone(),
        ));
        let session = Arc::new(SessionFlow::new(
            users.clone(),
            collaborators.identity,
            collaborators.leaderboard,
        ));
        let quiz_service = QuizService::new(
            extractor,
            generator,
            quizzes.clone(),
            users.clone(),
            stats.clone(),
        );

        Ok(Self {
            pool,
            config,
            quizzes,
            users,
            quiz_service,
            stats,
            session,
        })
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for QuizStore {
    fn from_ref(state: &AppState) -> Self {
        state.quizzes.clone()
    }
}

impl FromRef<AppState> for UserStore {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}

impl FromRef<AppState> for QuizService {
    fn from_ref(state: &AppState) -> Self {
        state.quiz_service.clone()
    }
}

impl FromRef<AppState> for Arc<StatsSynchronizer> {
    fn from_ref(state: &AppState) -> Self {
        state.stats.clone()
    }
}

impl FromRef<AppState> for Arc<SessionFlow> {
    fn from_ref(state: &AppState) -> Self {
        state.session.clone()
    }
}
