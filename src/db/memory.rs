// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local user store.
//!
//! Each record lives in its own `DashMap` slot; holding the slot's write
//! guard for the whole read-modify-write gives per-record atomicity for
//! increments and transactions. Natural order is ascending document ID.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;

use super::{
    Direction, FieldUpdates, Filter, OrderBy, ScannedUser, TransactionFn, UserStore,
    MAX_BATCH_WRITES,
};
use crate::error::{AppError, Result};
use crate::models::UserRecord;

/// In-memory [`UserStore`]. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record under its own `id`.
    pub fn put(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Snapshot of all records in natural order.
    fn snapshot(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

fn passes_filter(user: &UserRecord, filter: Option<&Filter>) -> bool {
    filter.map_or(true, |f| user.field_value(f.field).as_ref() == Some(&f.value))
}

fn compare(a: &UserRecord, b: &UserRecord, order: &[OrderBy]) -> Ordering {
    order
        .iter()
        .map(|key| {
            let ord = a.field_value(key.field).cmp(&b.field_value(key.field));
            match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl UserStore for MemoryStore {
    fn create<'a>(&'a self, user: &'a UserRecord) -> BoxFuture<'a, Result<String>> {
        async move {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let mut stored = user.clone();
            stored.id = id.clone();
            self.users.insert(id.clone(), stored);
            Ok(id)
        }
        .boxed()
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRecord>>> {
        async move { Ok(self.users.get(id).map(|e| e.value().clone())) }.boxed()
    }

    fn get_one_by_equality(&self, filter: Filter) -> BoxFuture<'_, Result<Option<UserRecord>>> {
        async move {
            Ok(self
                .snapshot()
                .into_iter()
                .find(|user| passes_filter(user, Some(&filter))))
        }
        .boxed()
    }

    fn increment_fields<'a>(
        &'a self,
        id: &'a str,
        deltas: &'a [(&'static str, i64)],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut entry = self.users.get_mut(id).ok_or_else(|| not_found(id))?;
            let mut next = entry.value().clone();
            for (field, delta) in deltas {
                next.add_to_counter(field, *delta)?;
            }
            *entry = next;
            Ok(())
        }
        .boxed()
    }

    fn update_fields<'a>(
        &'a self,
        id: &'a str,
        updates: FieldUpdates,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut entry = self.users.get_mut(id).ok_or_else(|| not_found(id))?;
            entry.apply_updates(&updates)
        }
        .boxed()
    }

    fn run_transaction<'a>(
        &'a self,
        id: &'a str,
        body: TransactionFn<'a>,
    ) -> BoxFuture<'a, Result<UserRecord>> {
        async move {
            // The guard excludes every other writer of this record until commit.
            let mut entry = self.users.get_mut(id).ok_or_else(|| not_found(id))?;
            let updates = body(entry.value())?;
            entry.apply_updates(&updates)?;
            Ok(entry.value().clone())
        }
        .boxed()
    }

    fn scan_ordered<'a>(
        &'a self,
        filter: Option<Filter>,
        order: &'a [OrderBy],
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<UserRecord>>> {
        async move {
            let mut users: Vec<UserRecord> = self
                .snapshot()
                .into_iter()
                .filter(|user| passes_filter(user, filter.as_ref()))
                .collect();
            // Stable sort keeps natural order among ties.
            users.sort_by(|a, b| compare(a, b, order));
            users.truncate(limit);
            Ok(users)
        }
        .boxed()
    }

    fn for_each(&self, filter: Option<Filter>) -> BoxStream<'_, Result<ScannedUser>> {
        let users = self.snapshot();
        stream::iter(users)
            .filter(move |user| futures_util::future::ready(passes_filter(user, filter.as_ref())))
            .map(|user| {
                Ok(ScannedUser {
                    id: user.id.clone(),
                    record: Ok(user),
                })
            })
            .boxed()
    }

    fn commit_batch(&self, writes: Vec<(String, FieldUpdates)>) -> BoxFuture<'_, Result<()>> {
        async move {
            if writes.len() > MAX_BATCH_WRITES {
                return Err(AppError::Database(format!(
                    "Batch of {} writes exceeds limit of {}",
                    writes.len(),
                    MAX_BATCH_WRITES
                )));
            }

            // Check every write first so a bad entry leaves the batch unapplied.
            for (id, updates) in &writes {
                let mut staged = self
                    .users
                    .get(id)
                    .map(|e| e.value().clone())
                    .ok_or_else(|| not_found(id))?;
                staged.apply_updates(updates)?;
            }
            for (id, updates) in &writes {
                if let Some(mut entry) = self.users.get_mut(id) {
                    entry.apply_updates(updates)?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}
