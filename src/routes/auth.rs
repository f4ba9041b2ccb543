// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone-number registration and login routes.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::models::{NewUser, Role};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(range(min = 0, message = "age must not be negative"))]
    pub age: Option<i64>,
    pub gender: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub uid: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let user = state
        .ledger
        .register_if_phone_free(NewUser {
            name: payload.name,
            phone: payload.phone,
            age: payload.age,
            gender: payload.gender,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            uid: user.id,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub name: String,
    pub token: String,
    pub role: Role,
    pub days_since_last_login: i64,
}

/// Log in by phone number.
///
/// An unknown phone is reported as 401, not 404.
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let outcome = state.ledger.login(&payload.phone).await.map_err(|e| match e {
        AppError::NotFound(_) => AppError::Unauthorized,
        other => other,
    })?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        name: outcome.user.name,
        token: outcome.token,
        role: outcome.user.role,
        days_since_last_login: outcome.days_since_last_login,
    }))
}
