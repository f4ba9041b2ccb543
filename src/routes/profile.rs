// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routes for the authenticated caller's own record.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::MessageResponse;
use crate::error::Result;
use crate::extract::ValidJson;
use crate::middleware::auth::AuthUser;
use crate::models::{ProfileUpdate, UserRecord};
use crate::AppState;

/// Profile routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile/me", get(get_me).put(update_me))
        .route("/profile/activity", post(add_activity))
        .route("/profile/tree", post(add_tree))
        .route("/profile/tree/water", post(water_tree))
}

// ─── Profile ─────────────────────────────────────────────────

/// A user record together with its document ID.
#[derive(Debug, Serialize)]
pub struct FullRecordResponse {
    pub id: String,
    #[serde(flatten)]
    pub record: UserRecord,
}

impl From<UserRecord> for FullRecordResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            record,
        }
    }
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FullRecordResponse>> {
    let record = state.ledger.get_record(&user.user_id).await?;
    Ok(Json(record.into()))
}

/// Partial profile update. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "phone must not be empty"))]
    pub phone: Option<String>,
    #[validate(range(min = 0, message = "age must not be negative"))]
    pub age: Option<i64>,
    pub gender: Option<String>,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>> {
    let update = ProfileUpdate {
        name: payload.name,
        phone: payload.phone,
        age: payload.age,
        gender: payload.gender,
    };

    if state.ledger.update_profile(&user.user_id, update).await? {
        Ok(MessageResponse::new("Profile updated successfully"))
    } else {
        Ok(MessageResponse::new("No fields to update"))
    }
}

// ─── Progress ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityRequest {
    #[validate(range(min = 0, message = "minute must not be negative"))]
    pub minute: i64,
    #[validate(range(min = 0, message = "score must not be negative"))]
    pub score: i64,
}

async fn add_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidJson(payload): ValidJson<ActivityRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .ledger
        .accrue_activity(&user.user_id, payload.minute, payload.score)
        .await?;
    Ok(MessageResponse::new("Score and minute updated successfully"))
}

async fn add_tree(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    state.ledger.increment_tree_count(&user.user_id).await?;
    Ok(MessageResponse::new("Tree count updated successfully"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct WaterRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct WaterResponse {
    pub message: String,
    pub new_score: i64,
    pub tree_progress: i64,
    pub number_tree: i64,
}

async fn water_tree(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidJson(payload): ValidJson<WaterRequest>,
) -> Result<Json<WaterResponse>> {
    let counters = state.ledger.water_tree(&user.user_id, payload.amount).await?;

    Ok(Json(WaterResponse {
        message: "Tree watered successfully".to_string(),
        new_score: counters.score,
        tree_progress: counters.tree_progress,
        number_tree: counters.number_tree,
    }))
}
