// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of [`UserStore`].
//!
//! Notes on the Firestore side of the contract:
//! - Increments use server-side field transforms, so they never read first.
//! - `run_transaction` reads through the transaction; a commit that loses
//!   a conflict is retried with fresh data a bounded number of times.
//! - The leaderboard query needs a composite index on
//!   (`role` ASC, `number_tree` DESC, `score` DESC).

use crate::db::{
    collections, Direction, FieldUpdates, Filter, OrderBy, ScannedUser, TransactionFn, UserStore,
    FieldValue, MAX_BATCH_WRITES,
};
use crate::error::{AppError, Result};
use crate::models::UserRecord;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection, FirestoreTransaction};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use gcloud_sdk::google::firestore::v1::Document;
use std::collections::BTreeMap;
use std::time::Duration;

const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const TRANSACTION_RETRY_BASE_DELAY_MS: u64 = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

fn db_err(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Database(format!("{}: {}", context, e))
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

/// Owned copy of `updates` for the Firestore serializer.
fn stored_fields(updates: &FieldUpdates) -> BTreeMap<String, FieldValue> {
    updates
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

/// Commit failures worth retrying: lost contention (`ABORTED`) and other
/// errors Firestore marks as transient.
fn is_contention(e: &FirestoreError) -> bool {
    matches!(e, FirestoreError::DatabaseError(db) if db.retry_possible)
}

fn direction(direction: Direction) -> FirestoreQueryDirection {
    match direction {
        Direction::Ascending => FirestoreQueryDirection::Ascending,
        Direction::Descending => FirestoreQueryDirection::Descending,
    }
}

/// Map a raw document from a collection scan. The ID is always recoverable
/// from the document name even when the fields are not.
fn scanned_from_document(doc: Document) -> ScannedUser {
    let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
    let record = firestore::FirestoreDb::deserialize_doc_to::<UserRecord>(&doc)
        .map(|mut user| {
            user.id = id.clone();
            user
        })
        .map_err(|e| db_err("Failed to map user document", e));
    ScannedUser { id, record }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| db_err("Failed to connect to Firestore", e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| db_err("Failed to connect to Firestore Emulator", e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>> {
        self.client
            .begin_transaction()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))
    }

    /// Read a user through `transaction`, registering the document for
    /// conflict detection at commit.
    async fn get_in_transaction(
        &self,
        transaction: &FirestoreTransaction<'_>,
        id: &str,
    ) -> Result<Option<UserRecord>> {
        let reader = self
            .client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ));

        let user: Option<UserRecord> = reader
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| db_err("Failed to read user in transaction", e))?;

        Ok(user.map(|mut user| {
            user.id = id.to_string();
            user
        }))
    }

    async fn require_exists(&self, id: &str) -> Result<()> {
        match self.get_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(not_found(id)),
        }
    }

    async fn transact(&self, id: &str, body: TransactionFn<'_>) -> Result<UserRecord> {
        let mut attempt = 1;
        loop {
            let mut transaction = self.begin().await?;

            let current = match self.get_in_transaction(&transaction, id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    let _ = transaction.rollback().await;
                    return Err(not_found(id));
                }
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            // Business-rule failures abort without writing and are never retried.
            let updates = match body(&current) {
                Ok(updates) => updates,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            let mut committed = current;
            if let Err(e) = committed.apply_updates(&updates) {
                let _ = transaction.rollback().await;
                return Err(e);
            }

            let fields = stored_fields(&updates);
            let staged = self
                .client
                .fluent()
                .update()
                .fields(updates.keys().copied())
                .in_col(collections::USERS)
                .document_id(id)
                .object(&fields)
                .add_to_transaction(&mut transaction)
                .map(|_| ());
            if let Err(e) = staged {
                let _ = transaction.rollback().await;
                return Err(db_err("Failed to add update to transaction", e));
            }

            match transaction.commit().await {
                Ok(_) => return Ok(committed),
                Err(e) if attempt < MAX_TRANSACTION_ATTEMPTS && is_contention(&e) => {
                    tracing::warn!(
                        user_id = id,
                        attempt,
                        error = %e,
                        "Transaction commit failed, retrying with fresh read"
                    );
                    let delay = TRANSACTION_RETRY_BASE_DELAY_MS << (attempt - 1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(db_err("Transaction commit failed", e)),
            }
        }
    }
}

impl UserStore for FirestoreDb {
    fn create<'a>(&'a self, user: &'a UserRecord) -> BoxFuture<'a, Result<String>> {
        async move {
            let created: UserRecord = self
                .client
                .fluent()
                .insert()
                .into(collections::USERS)
                .generate_document_id()
                .object(user)
                .execute()
                .await
                .map_err(|e| db_err("Failed to create user", e))?;
            Ok(created.id)
        }
        .boxed()
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRecord>>> {
        async move {
            let user: Option<UserRecord> = self
                .client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            Ok(user.map(|mut user| {
                user.id = id.to_string();
                user
            }))
        }
        .boxed()
    }

    fn get_one_by_equality(&self, filter: Filter) -> BoxFuture<'_, Result<Option<UserRecord>>> {
        async move {
            let users: Vec<UserRecord> = self
                .client
                .fluent()
                .select()
                .from(collections::USERS)
                .filter(move |q| q.for_all([q.field(filter.field).eq(filter.value.clone())]))
                .limit(1)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(users.into_iter().next())
        }
        .boxed()
    }

    fn increment_fields<'a>(
        &'a self,
        id: &'a str,
        deltas: &'a [(&'static str, i64)],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            // Transforms on a missing document would create it.
            self.require_exists(id).await?;

            let mut transaction = self.begin().await?;
            let staged = self
                .client
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(id)
                .transforms(|t| {
                    t.fields(
                        deltas
                            .iter()
                            .map(|(field, delta)| t.field(*field).increment(*delta)),
                    )
                })
                .only_transform()
                .add_to_transaction(&mut transaction)
                .map(|_| ());
            if let Err(e) = staged {
                let _ = transaction.rollback().await;
                return Err(db_err("Failed to add increment to transaction", e));
            }

            transaction
                .commit()
                .await
                .map_err(|e| db_err("Increment commit failed", e))?;
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
            self.require_exists(id).await?;

            let _: () = self
                .client
                .fluent()
                .update()
                .fields(updates.keys().copied())
                .in_col(collections::USERS)
                .document_id(id)
                .object(&stored_fields(&updates))
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(())
        }
        .boxed()
    }

    fn run_transaction<'a>(
        &'a self,
        id: &'a str,
        body: TransactionFn<'a>,
    ) -> BoxFuture<'a, Result<UserRecord>> {
        self.transact(id, body).boxed()
    }

    fn scan_ordered<'a>(
        &'a self,
        filter: Option<Filter>,
        order: &'a [OrderBy],
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<UserRecord>>> {
        async move {
            let users: Vec<UserRecord> = self
                .client
                .fluent()
                .select()
                .from(collections::USERS)
                .filter(move |q| {
                    filter
                        .as_ref()
                        .and_then(|f| q.field(f.field).eq(f.value.clone()))
                })
                .order_by(order.iter().map(|key| (key.field, direction(key.direction))))
                .limit(u32::try_from(limit).unwrap_or(u32::MAX))
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(users)
        }
        .boxed()
    }

    fn for_each(&self, filter: Option<Filter>) -> BoxStream<'_, Result<ScannedUser>> {
        stream::once(async move {
            self.client
                .fluent()
                .select()
                .from(collections::USERS)
                .filter(move |q| {
                    filter
                        .as_ref()
                        .and_then(|f| q.field(f.field).eq(f.value.clone()))
                })
                .stream_query_with_errors()
                .await
                .map_err(|e| db_err("Failed to start user scan", e))
        })
        .map_ok(|docs| {
            docs.map(|doc| {
                doc.map(scanned_from_document)
                    .map_err(|e| db_err("Failed to iterate users", e))
            })
        })
        .try_flatten()
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

            let mut transaction = self.begin().await?;
            for (id, updates) in &writes {
                let fields = stored_fields(updates);
                let staged = self
                    .client
                    .fluent()
                    .update()
                    .fields(updates.keys().copied())
                    .in_col(collections::USERS)
                    .document_id(id)
                    .object(&fields)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ());
                if let Err(e) = staged {
                    let _ = transaction.rollback().await;
                    return Err(db_err("Failed to add write to batch", e));
                }
            }

            transaction
                .commit()
                .await
                .map_err(|e| db_err("Failed to commit batch", e))?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fields;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_stored_fields_keeps_every_write() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let mut updates = FieldUpdates::new();
        updates.insert(fields::SCORE, FieldValue::Int(0));
        updates.insert(fields::NAME, FieldValue::from("Pim"));
        updates.insert(fields::LAST_LOGIN_AT, FieldValue::Timestamp(at));

        let stored = stored_fields(&updates);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored["score"], FieldValue::Int(0));
        assert_eq!(stored["name"], FieldValue::Str("Pim".to_string()));
        assert_eq!(stored["last_login_at"], FieldValue::Timestamp(at));
    }

    #[test]
    fn test_field_values_deserialize_by_shape() {
        let parsed: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"minute": 15, "gender": "f"}"#).unwrap();
        assert_eq!(parsed["minute"], FieldValue::Int(15));
        assert_eq!(parsed["gender"], FieldValue::Str("f".to_string()));
    }

    #[test]
    fn test_only_transient_commit_errors_retry() {
        let aborted = FirestoreError::from(gcloud_sdk::tonic::Status::aborted("contention"));
        let denied =
            FirestoreError::from(gcloud_sdk::tonic::Status::permission_denied("no access"));
        let missing = FirestoreError::from(gcloud_sdk::tonic::Status::not_found("gone"));

        assert!(is_contention(&aborted));
        assert!(!is_contention(&denied));
        assert!(!is_contention(&missing));
    }
}
