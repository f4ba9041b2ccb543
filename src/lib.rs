// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meerank: backend for a gamified exercise tracker.
//!
//! Members log exercise minutes and score, spend score to grow trees, and
//! compete on a leaderboard ranked by trees grown. This crate provides the
//! HTTP API, session tokens, and the user store adapters.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use chrono::Duration;
use config::Config;
use db::UserStore;
use services::{AdminOperator, Leaderboard, ProgressLedger, SessionTokens};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: SessionTokens,
    pub ledger: ProgressLedger,
    pub leaderboard: Leaderboard,
    pub admin: AdminOperator,
}

impl AppState {
    /// Wire every service to one store and the configured secrets.
    pub fn new(config: &Config, store: Arc<dyn UserStore>) -> Self {
        let tokens = SessionTokens::new(
            &config.jwt_signing_key,
            Duration::hours(config.session_ttl_hours),
        );
        let ledger = ProgressLedger::new(store.clone(), tokens.clone(), config.calendar_offset);
        let leaderboard = Leaderboard::new(store.clone(), config.leaderboard_size);
        let admin = AdminOperator::new(store.clone());

        Self {
            store,
            tokens,
            ledger,
            leaderboard,
            admin,
        }
    }
}
