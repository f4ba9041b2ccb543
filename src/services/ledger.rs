// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress ledger: registration, login and every mutation of a user's
//! counters.
//!
//! Activity and tree-count changes are store-side atomic adds and need no
//! locking here. Watering is the only read-modify-write and always runs in
//! a store transaction.

use chrono::{FixedOffset, Utc};
use std::sync::Arc;

use crate::db::{fields, FieldUpdates, FieldValue, Filter, UserStore};
use crate::error::{AppError, Result};
use crate::models::{apply_watering, Counters, NewUser, ProfileUpdate, UserRecord};
use crate::services::SessionTokens;
use crate::time_utils::calendar_days_between;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub days_since_last_login: i64,
    pub token: String,
}

#[derive(Clone)]
pub struct ProgressLedger {
    store: Arc<dyn UserStore>,
    tokens: SessionTokens,
    calendar_offset: FixedOffset,
}

fn user_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

impl ProgressLedger {
    pub fn new(store: Arc<dyn UserStore>, tokens: SessionTokens, calendar_offset: FixedOffset) -> Self {
        Self {
            store,
            tokens,
            calendar_offset,
        }
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserRecord>> {
        self.store
            .get_one_by_equality(Filter::eq(fields::PHONE, phone))
            .await
    }

    /// Create a member record unless the phone is already registered.
    ///
    /// The lookup and the insert are separate store calls, so two concurrent
    /// registrations with the same phone can both succeed.
    pub async fn register_if_phone_free(&self, new_user: NewUser) -> Result<UserRecord> {
        if self.find_by_phone(&new_user.phone).await?.is_some() {
            return Err(AppError::Conflict(
                "Phone number already registered".to_string(),
            ));
        }

        let mut record = new_user.into_record();
        record.id = self.store.create(&record).await?;

        tracing::info!(user_id = %record.id, "Registered new member");
        Ok(record)
    }

    /// Log in by phone and issue a session token.
    pub async fn login(&self, phone: &str) -> Result<LoginOutcome> {
        let user = self
            .find_by_phone(phone)
            .await?
            .ok_or_else(|| AppError::NotFound("Phone number not found".to_string()))?;

        let now = Utc::now();
        let days_since_last_login = user
            .last_login_at
            .map(|last| calendar_days_between(last, now, self.calendar_offset))
            .unwrap_or(0);

        let mut updates = FieldUpdates::new();
        updates.insert(fields::LAST_LOGIN_AT, FieldValue::Timestamp(now));
        if let Err(e) = self.store.update_fields(&user.id, updates).await {
            // Recording the login time is best-effort; the login still succeeds.
            tracing::warn!(user_id = %user.id, error = %e, "Failed to update last login time");
        }

        let token = self.tokens.issue(&user.id, user.role)?;

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            days_since_last_login,
            "User logged in"
        );

        Ok(LoginOutcome {
            user,
            days_since_last_login,
            token,
        })
    }

    pub async fn get_record(&self, id: &str) -> Result<UserRecord> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    /// Overwrite the supplied profile fields. Returns `false` when the update
    /// names no fields and nothing was written.
    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        if let Some(phone) = update.phone.as_deref() {
            if let Some(owner) = self.find_by_phone(phone).await? {
                if owner.id != id {
                    return Err(AppError::Conflict(
                        "Phone number already registered".to_string(),
                    ));
                }
            }
        }

        let mut updates = FieldUpdates::new();
        if let Some(name) = update.name {
            updates.insert(fields::NAME, name.into());
        }
        if let Some(phone) = update.phone {
            updates.insert(fields::PHONE, phone.into());
        }
        if let Some(age) = update.age {
            updates.insert(fields::AGE, age.into());
        }
        if let Some(gender) = update.gender {
            updates.insert(fields::GENDER, gender.into());
        }

        self.store.update_fields(id, updates).await?;
        tracing::debug!(user_id = id, "Profile updated");
        Ok(true)
    }

    /// Add exercise minutes and score.
    pub async fn accrue_activity(&self, id: &str, minute_delta: i64, score_delta: i64) -> Result<()> {
        self.store
            .increment_fields(id, &[(fields::MINUTE, minute_delta), (fields::SCORE, score_delta)])
            .await?;

        tracing::debug!(user_id = id, minute_delta, score_delta, "Activity accrued");
        Ok(())
    }

    pub async fn increment_tree_count(&self, id: &str) -> Result<()> {
        self.store
            .increment_fields(id, &[(fields::NUMBER_TREE, 1)])
            .await
    }

    /// Spend `amount` score on tree growth, atomically.
    pub async fn water_tree(&self, id: &str, amount: i64) -> Result<Counters> {
        if amount <= 0 {
            return Err(AppError::BadRequest("Amount must be positive".to_string()));
        }

        let committed = self
            .store
            .run_transaction(
                id,
                Box::new(move |user: &UserRecord| {
                    let next = apply_watering(Counters::from(user), amount)?;

                    let mut updates = FieldUpdates::new();
                    updates.insert(fields::SCORE, next.score.into());
                    updates.insert(fields::TREE_PROGRESS, next.tree_progress.into());
                    updates.insert(fields::NUMBER_TREE, next.number_tree.into());
                    Ok(updates)
                }),
            )
            .await?;

        let counters = Counters::from(&committed);
        tracing::info!(
            user_id = id,
            amount,
            score = counters.score,
            tree_progress = counters.tree_progress,
            number_tree = counters.number_tree,
            "Tree watered"
        );
        Ok(counters)
    }
}
