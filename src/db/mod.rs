// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Services talk to user records only through [`UserStore`], which keeps the
//! store substitutable: [`FirestoreDb`] in production, [`MemoryStore`] for
//! local development and tests.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use self::memory::MemoryStore;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::models::{Role, UserRecord};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
}

/// Stored field names of a user document.
pub mod fields {
    pub const NAME: &str = "name";
    pub const PHONE: &str = "phone";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const MINUTE: &str = "minute";
    pub const SCORE: &str = "score";
    pub const NUMBER_TREE: &str = "number_tree";
    pub const TREE_PROGRESS: &str = "tree_progress";
    pub const ROLE: &str = "role";
    pub const LAST_LOGIN_AT: &str = "last_login_at";
}

/// Firestore limits batch/transaction writes to 500 operations.
pub const MAX_BATCH_WRITES: usize = 500;

/// A value written to (or matched against) a single field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Str(String),
    Timestamp(#[serde(with = "::firestore::serialize_as_timestamp")] DateTime<Utc>),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<Role> for FieldValue {
    fn from(role: Role) -> Self {
        FieldValue::Str(role.as_str().to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

/// Field overwrites keyed by field name. Fields not present are untouched.
pub type FieldUpdates = BTreeMap<&'static str, FieldValue>;

/// Equality filter on one field.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: &'static str,
    pub value: FieldValue,
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One sort key of an ordered scan.
#[derive(Debug, Clone, Copy)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: Direction,
}

impl OrderBy {
    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: Direction::Descending,
        }
    }
}

/// A document produced by a full-collection scan.
///
/// `record` fails independently when the document cannot be mapped to a
/// [`UserRecord`], so a scan can continue past malformed documents.
#[derive(Debug)]
pub struct ScannedUser {
    pub id: String,
    pub record: Result<UserRecord>,
}

/// Transaction body: given the record as read inside the transaction,
/// return the fields to write, or an error to abort without writing.
///
/// The store may invoke the body more than once if the commit contends.
pub type TransactionFn<'a> = Box<dyn Fn(&UserRecord) -> Result<FieldUpdates> + Send + Sync + 'a>;

/// Narrow contract over the persistent user collection.
pub trait UserStore: Send + Sync {
    /// Insert a new record and return its store-assigned ID.
    fn create<'a>(&'a self, user: &'a UserRecord) -> BoxFuture<'a, Result<String>>;

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRecord>>>;

    /// First record (in natural store order) whose field equals `filter.value`.
    fn get_one_by_equality(&self, filter: Filter) -> BoxFuture<'_, Result<Option<UserRecord>>>;

    /// Store-side atomic add of each delta. The record must exist.
    fn increment_fields<'a>(
        &'a self,
        id: &'a str,
        deltas: &'a [(&'static str, i64)],
    ) -> BoxFuture<'a, Result<()>>;

    /// Last-writer-wins overwrite of the given fields. The record must exist.
    fn update_fields<'a>(&'a self, id: &'a str, updates: FieldUpdates)
        -> BoxFuture<'a, Result<()>>;

    /// Isolated read-modify-write of one record.
    ///
    /// Returns the record as committed. Errors from `body` abort the
    /// transaction with no write and are returned unchanged.
    fn run_transaction<'a>(
        &'a self,
        id: &'a str,
        body: TransactionFn<'a>,
    ) -> BoxFuture<'a, Result<UserRecord>>;

    /// Up to `limit` records matching `filter`, sorted by `order`.
    fn scan_ordered<'a>(
        &'a self,
        filter: Option<Filter>,
        order: &'a [OrderBy],
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<UserRecord>>>;

    /// Lazy scan over every document matching `filter`. Each call starts over.
    fn for_each(&self, filter: Option<Filter>) -> BoxStream<'_, Result<ScannedUser>>;

    /// Apply all writes atomically. At most [`MAX_BATCH_WRITES`] entries.
    fn commit_batch(&self, writes: Vec<(String, FieldUpdates)>) -> BoxFuture<'_, Result<()>>;
}

impl UserRecord {
    /// Current value of a stored field, if set.
    pub fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            fields::NAME => Some(self.name.as_str().into()),
            fields::PHONE => self.phone.as_deref().map(Into::into),
            fields::AGE => self.age.map(Into::into),
            fields::GENDER => self.gender.as_deref().map(Into::into),
            fields::MINUTE => Some(self.minute.into()),
            fields::SCORE => Some(self.score.into()),
            fields::NUMBER_TREE => Some(self.number_tree.into()),
            fields::TREE_PROGRESS => Some(self.tree_progress.into()),
            fields::ROLE => Some(self.role.into()),
            fields::LAST_LOGIN_AT => self.last_login_at.map(Into::into),
            _ => None,
        }
    }

    /// Add `delta` to a counter field.
    pub(crate) fn add_to_counter(&mut self, field: &str, delta: i64) -> Result<()> {
        let counter = match field {
            fields::MINUTE => &mut self.minute,
            fields::SCORE => &mut self.score,
            fields::NUMBER_TREE => &mut self.number_tree,
            fields::TREE_PROGRESS => &mut self.tree_progress,
            other => return Err(unknown_field(other)),
        };
        *counter = counter
            .checked_add(delta)
            .ok_or_else(|| AppError::BadRequest(format!("Increment overflows '{field}'")))?;
        Ok(())
    }

    /// Overwrite fields in place. On error the record is left unchanged.
    pub(crate) fn apply_updates(&mut self, updates: &FieldUpdates) -> Result<()> {
        let mut next = self.clone();
        for (field, value) in updates {
            match (*field, value) {
                (fields::NAME, FieldValue::Str(v)) => next.name = v.clone(),
                (fields::PHONE, FieldValue::Str(v)) => next.phone = Some(v.clone()),
                (fields::AGE, FieldValue::Int(v)) => next.age = Some(*v),
                (fields::GENDER, FieldValue::Str(v)) => next.gender = Some(v.clone()),
                (fields::MINUTE, FieldValue::Int(v)) => next.minute = *v,
                (fields::SCORE, FieldValue::Int(v)) => next.score = *v,
                (fields::NUMBER_TREE, FieldValue::Int(v)) => next.number_tree = *v,
                (fields::TREE_PROGRESS, FieldValue::Int(v)) => next.tree_progress = *v,
                (fields::LAST_LOGIN_AT, FieldValue::Timestamp(v)) => next.last_login_at = Some(*v),
                (fields::ROLE, FieldValue::Str(v)) => {
                    next.role = match v.as_str() {
                        "member" => Role::Member,
                        "admin" => Role::Admin,
                        _ => return Err(AppError::Database(format!("Invalid role '{v}'"))),
                    }
                }
                (other, _) => return Err(unknown_field(other)),
            }
        }
        *self = next;
        Ok(())
    }
}

fn unknown_field(field: &str) -> AppError {
    AppError::Database(format!("Unsupported write to field '{field}'"))
}
