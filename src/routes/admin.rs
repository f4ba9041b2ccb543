// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrator routes. Auth and the admin role gate are applied in
//! routes/mod.rs.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use super::profile::FullRecordResponse;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::UserSummary;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/reset-stats", post(reset_stats))
        .route("/admin/users/{uid}", get(get_user))
}

/// Every user except the calling admin.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(state.admin.list_all_except(&caller.user_id).await?))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<FullRecordResponse>> {
    Ok(Json(state.admin.get_full_record(&uid).await?.into()))
}

#[derive(Debug, Serialize)]
pub struct ResetStatsResponse {
    pub message: String,
    pub count: usize,
}

async fn reset_stats(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ResetStatsResponse>> {
    tracing::info!(admin_id = %caller.user_id, "Admin requested stats reset");
    let count = state.admin.reset_all_stats().await?;

    Ok(Json(ResetStatsResponse {
        message: "All user stats reset".to_string(),
        count,
    }))
}
