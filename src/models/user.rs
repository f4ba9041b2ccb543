//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse authorization label carried in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User document stored in the `users` collection.
///
/// The document ID is not a stored field; Firestore exposes it through the
/// `_firestore_id` pseudo-field when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub minute: i64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub number_tree: i64,
    #[serde(default)]
    pub tree_progress: i64,
    pub role: Role,
    #[serde(
        default,
        with = "firestore::serialize_as_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for a new registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
}

impl NewUser {
    /// Build the record to insert: role `member`, all counters zero.
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            id: String::new(),
            name: self.name,
            phone: Some(self.phone),
            age: self.age,
            gender: self.gender,
            minute: 0,
            score: 0,
            number_tree: 0,
            tree_progress: 0,
            role: Role::Member,
            last_login_at: None,
        }
    }
}

/// Owner-editable profile fields. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.age.is_none() && self.gender.is_none()
    }
}
