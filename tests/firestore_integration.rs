// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running, with
//! FIRESTORE_EMULATOR_HOST set. Each test works on documents it created,
//! identified by a unique phone number.

use futures_util::StreamExt;
use meerank::db::{fields, FieldUpdates, FieldValue, Filter, OrderBy, UserStore};
use meerank::error::AppError;
use meerank::models::{apply_watering, Counters, NewUser, Role, UserRecord};

mod common;
use common::test_db;

/// Generate a unique phone number for test isolation.
fn unique_phone() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-{nanos}")
}

fn test_user(phone: &str) -> UserRecord {
    NewUser {
        name: "Test User".to_string(),
        phone: phone.to_string(),
        age: Some(35),
        gender: Some("x".to_string()),
    }
    .into_record()
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORD TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_get_and_lookup_by_phone() {
    require_emulator!();

    let db = test_db().await;
    let phone = unique_phone();
    let user = test_user(&phone);

    let id = db.create(&user).await.expect("Failed to create user");
    assert!(!id.is_empty());

    let fetched = db.get_by_id(&id).await.unwrap().expect("User should exist");
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.name, user.name);
    assert_eq!(fetched.phone, user.phone);
    assert_eq!(fetched.role, Role::Member);

    let by_phone = db
        .get_one_by_equality(Filter::eq(fields::PHONE, phone.as_str()))
        .await
        .unwrap()
        .expect("Phone lookup should find the user");
    assert_eq!(by_phone.id, id);

    assert!(db.get_by_id("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn test_increment_and_update_fields() {
    require_emulator!();

    let db = test_db().await;
    let id = db.create(&test_user(&unique_phone())).await.unwrap();

    db.increment_fields(&id, &[(fields::MINUTE, 30), (fields::SCORE, 150)])
        .await
        .unwrap();
    db.increment_fields(&id, &[(fields::SCORE, 50)]).await.unwrap();

    let mut updates = FieldUpdates::new();
    updates.insert(fields::NAME, FieldValue::from("Renamed"));
    db.update_fields(&id, updates).await.unwrap();

    let user = db.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!((user.minute, user.score), (30, 200));
    assert_eq!(user.name, "Renamed");
    assert_eq!(user.age, Some(35));
}

#[tokio::test]
async fn test_increment_missing_document_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let err = db
        .increment_fields(&unique_phone(), &[(fields::SCORE, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSACTION TESTS
// ═══════════════════════════════════════════════════════════════════════════

fn watering(amount: i64) -> meerank::db::TransactionFn<'static> {
    Box::new(move |user: &UserRecord| {
        let next = apply_watering(Counters::from(user), amount)?;
        let mut updates = FieldUpdates::new();
        updates.insert(fields::SCORE, next.score.into());
        updates.insert(fields::TREE_PROGRESS, next.tree_progress.into());
        updates.insert(fields::NUMBER_TREE, next.number_tree.into());
        Ok(updates)
    })
}

#[tokio::test]
async fn test_transaction_commits_counters() {
    require_emulator!();

    let db = test_db().await;
    let mut user = test_user(&unique_phone());
    user.score = 2500;
    user.tree_progress = 800;
    let id = db.create(&user).await.unwrap();

    let committed = db.run_transaction(&id, watering(2500)).await.unwrap();
    assert_eq!(
        Counters::from(&committed),
        Counters {
            score: 0,
            tree_progress: 300,
            number_tree: 3,
        }
    );

    let stored = db.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(Counters::from(&stored), Counters::from(&committed));
}

#[tokio::test]
async fn test_transaction_business_failure_writes_nothing() {
    require_emulator!();

    let db = test_db().await;
    let mut user = test_user(&unique_phone());
    user.score = 40;
    let id = db.create(&user).await.unwrap();

    let err = db.run_transaction(&id, watering(100)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientScore {
            available: 40,
            requested: 100
        }
    ));

    let stored = db.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.score, 40);
    assert_eq!(stored.tree_progress, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCAN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_scan_ordered_ranks_members() {
    require_emulator!();

    let db = test_db().await;
    let tag = unique_phone();
    let mut ids = vec![];
    for (trees, score) in [(900_001, 5), (900_001, 9), (900_002, 0)] {
        let mut user = test_user(&format!("{tag}-{trees}-{score}"));
        user.number_tree = trees;
        user.score = score;
        ids.push(db.create(&user).await.unwrap());
    }

    let order = [
        OrderBy::desc(fields::NUMBER_TREE),
        OrderBy::desc(fields::SCORE),
    ];
    let top = db
        .scan_ordered(Some(Filter::eq(fields::ROLE, Role::Member)), &order, 3)
        .await
        .unwrap();

    let top_ids: Vec<&str> = top.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(top_ids, vec![ids[2].as_str(), ids[1].as_str(), ids[0].as_str()]);
}

#[tokio::test]
async fn test_for_each_and_commit_batch() {
    require_emulator!();

    let db = test_db().await;
    let phone = unique_phone();
    let mut user = test_user(&phone);
    user.score = 500;
    user.minute = 90;
    let id = db.create(&user).await.unwrap();

    let seen: Vec<String> = db
        .for_each(Some(Filter::eq(fields::PHONE, phone.as_str())))
        .map(|item| item.expect("Scan failed").id)
        .collect()
        .await;
    assert_eq!(seen, vec![id.clone()]);

    let mut zero = FieldUpdates::new();
    zero.insert(fields::SCORE, FieldValue::Int(0));
    zero.insert(fields::MINUTE, FieldValue::Int(0));
    db.commit_batch(vec![(id.clone(), zero)]).await.unwrap();

    let stored = db.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!((stored.score, stored.minute), (0, 0));
    assert_eq!(stored.phone.as_deref(), Some(phone.as_str()));
}
