// src/services/mod.rs

pub mod extractor;
pub mod generation;
pub mod leaderboard_store;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod quiz_service;
pub mod scoring;
pub mod session;
pub mod stats_sync;
