// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Whole-collection operations for administrators.

use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{fields, FieldUpdates, FieldValue, ScannedUser, UserStore, MAX_BATCH_WRITES};
use crate::error::{AppError, Result};
use crate::models::UserRecord;

/// Short form of a user for the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub uid: String,
    pub name: String,
}

#[derive(Clone)]
pub struct AdminOperator {
    store: Arc<dyn UserStore>,
}

/// Collect summaries of every scanned user except `caller_id`.
///
/// Documents that fail to map are logged and skipped; a failure of the
/// scan itself aborts the listing.
pub async fn summaries_except<S>(scan: S, caller_id: &str) -> Result<Vec<UserSummary>>
where
    S: Stream<Item = Result<ScannedUser>>,
{
    let mut scan = std::pin::pin!(scan);
    let mut summaries = Vec::new();

    while let Some(item) = scan.next().await {
        let ScannedUser { id, record } = item?;
        if id == caller_id {
            continue;
        }
        match record {
            Ok(user) => summaries.push(UserSummary {
                uid: id,
                name: user.name,
            }),
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Skipping unreadable user document");
            }
        }
    }

    Ok(summaries)
}

/// Field overwrites that zero every progress counter.
fn zeroed_counters() -> FieldUpdates {
    [
        fields::MINUTE,
        fields::SCORE,
        fields::NUMBER_TREE,
        fields::TREE_PROGRESS,
    ]
    .into_iter()
    .map(|field| (field, FieldValue::Int(0)))
    .collect()
}

impl AdminOperator {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Every user except the caller, in natural store order.
    pub async fn list_all_except(&self, caller_id: &str) -> Result<Vec<UserSummary>> {
        summaries_except(self.store.for_each(None), caller_id).await
    }

    pub async fn get_full_record(&self, id: &str) -> Result<UserRecord> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Zero `minute`, `score`, `number_tree` and `tree_progress` on every
    /// user document, committing in batches of at most
    /// [`MAX_BATCH_WRITES`]. Returns the number of documents reset.
    ///
    /// Batches are independent: if one fails, the ones before it stay
    /// committed and the rest are not attempted.
    pub async fn reset_all_stats(&self) -> Result<usize> {
        let mut scan = self.store.for_each(None);
        let mut pending: Vec<(String, FieldUpdates)> = Vec::with_capacity(MAX_BATCH_WRITES);
        let mut total = 0;

        while let Some(item) = scan.next().await {
            let scanned = item?;
            pending.push((scanned.id, zeroed_counters()));

            if pending.len() == MAX_BATCH_WRITES {
                total += self.commit(&mut pending, total).await?;
            }
        }
        if !pending.is_empty() {
            total += self.commit(&mut pending, total).await?;
        }

        tracing::info!(count = total, "Reset progress counters for all users");
        Ok(total)
    }

    async fn commit(&self, pending: &mut Vec<(String, FieldUpdates)>, done: usize) -> Result<usize> {
        let batch = std::mem::take(pending);
        let size = batch.len();

        self.store.commit_batch(batch).await.map_err(|e| {
            tracing::error!(committed = done, error = %e, "Stats reset batch failed");
            e
        })?;

        tracing::debug!(size, "Committed stats reset batch");
        Ok(size)
    }
}
