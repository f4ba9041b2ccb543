// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unauthenticated read-only routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::services::LeaderboardEntry;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/{uid}", get(get_user_card))
        .route("/leaderboard", get(get_leaderboard))
}

/// Public subset of a user's record.
#[derive(Debug, Serialize)]
pub struct UserCard {
    pub name: String,
    pub score: i64,
    pub minute: i64,
}

async fn get_user_card(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UserCard>> {
    let user = state.ledger.get_record(&uid).await?;

    Ok(Json(UserCard {
        name: user.name,
        score: user.score,
        minute: user.minute,
    }))
}

async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Result<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(state.leaderboard.top().await?))
}
