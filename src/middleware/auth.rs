// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication and role gating middleware.

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller extracted from a validated session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware that requires a valid session token.
///
/// A missing or non-Bearer `Authorization` header is `Unauthorized`; a
/// token that fails validation is `InvalidToken`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let claims = state.tokens.validate(token)?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

/// Middleware that admits only callers whose token carries `required`.
///
/// Must run after [`require_auth`]. Install with
/// `middleware::from_fn_with_state(Role::Admin, require_role)`.
pub async fn require_role(
    State(required): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.role == required => Ok(next.run(request).await),
        Some(user) => {
            tracing::warn!(
                user_id = %user.user_id,
                role = %user.role,
                required = %required,
                "Role check failed"
            );
            Err(AppError::Forbidden)
        }
        None => Err(AppError::Forbidden),
    }
}
