// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject missing, malformed, forged and expired tokens
//! 2. Admin routes reject member tokens
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Duration;
use meerank::models::Role;
use meerank::services::SessionTokens;
use tower::ServiceExt;

mod common;
use common::{create_test_app, seed_user, send, token_for};

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/profile/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_non_bearer_scheme() {
    let (app, state, store) = create_test_app();
    let id = seed_user(&store, "u1", Role::Member, 0);
    let token = token_for(&state, &id, Role::Member);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile/me")
                .header(header::AUTHORIZATION, format!("Basic {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_garbage_token() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/profile/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_protected_route_with_foreign_key_token() {
    let (app, _, store) = create_test_app();
    let id = seed_user(&store, "u1", Role::Member, 0);

    let forged = SessionTokens::new(b"some_other_signing_key_entirely!", Duration::hours(1))
        .issue(&id, Role::Member)
        .unwrap();

    let (status, _) = send(&app, Method::GET, "/profile/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_expired_token() {
    let (app, state, store) = create_test_app();
    let id = seed_user(&store, "u1", Role::Member, 0);

    let expired = state
        .tokens
        .issue_with_ttl(&id, Role::Member, Duration::seconds(-30))
        .unwrap();

    let (status, _) = send(&app, Method::GET, "/profile/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let (app, state, store) = create_test_app();
    let id = seed_user(&store, "u1", Role::Member, 40);
    let token = token_for(&state, &id, Role::Member);

    let (status, body) = send(&app, Method::GET, "/profile/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "u1");
    assert_eq!(body["score"], 40);
    assert_eq!(body["role"], "member");
}

#[tokio::test]
async fn test_member_token_on_admin_routes_is_forbidden() {
    let (app, state, store) = create_test_app();
    let id = seed_user(&store, "u1", Role::Member, 0);
    let token = token_for(&state, &id, Role::Member);

    for (method, uri) in [
        (Method::GET, "/admin/users"),
        (Method::GET, "/admin/users/u1"),
        (Method::POST, "/admin/users/reset-stats"),
    ] {
        let (status, body) = send(&app, method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn test_admin_routes_without_token_are_unauthorized() {
    let (app, _, _) = create_test_app();

    let (status, _) = send(&app, Method::GET, "/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let (app, _, store) = create_test_app();
    seed_user(&store, "u1", Role::Member, 10);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, Method::GET, "/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/user/u1", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/profile/tree/water")
                .header(header::ORIGIN, "https://app.example.org")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    let methods = headers
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
    assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
}
