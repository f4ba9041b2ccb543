// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use meerank::config::Config;
use meerank::db::{FirestoreDb, MemoryStore};
use meerank::models::{NewUser, Role, UserRecord};
use meerank::routes::create_router;
use meerank::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over a fresh in-memory store.
/// Returns the router, the shared state and the store for direct seeding.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>, MemoryStore) {
    let store = MemoryStore::new();
    let state = Arc::new(AppState::new(&Config::default(), Arc::new(store.clone())));
    (create_router(state.clone()), state, store)
}

/// Insert a user directly into the store and return its ID.
#[allow(dead_code)]
pub fn seed_user(store: &MemoryStore, id: &str, role: Role, score: i64) -> String {
    let mut user: UserRecord = NewUser {
        name: format!("User {id}"),
        phone: format!("08-{id}"),
        age: Some(30),
        gender: None,
    }
    .into_record();
    user.id = id.to_string();
    user.role = role;
    user.score = score;
    store.put(user);
    id.to_string()
}

/// A valid session token for `id`.
#[allow(dead_code)]
pub fn token_for(state: &AppState, id: &str, role: Role) -> String {
    state.tokens.issue(id, role).expect("Failed to issue token")
}

/// Send one request and decode the JSON response body (`Null` if empty).
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
