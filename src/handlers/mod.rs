// src/handlers/mod.rs

pub mod auth;
pub mod leaderboard;
pub mod profile;
pub mod quiz;
