// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod progress;
pub mod user;

pub use progress::{apply_watering, Counters, TREE_GROWTH_THRESHOLD};
pub use user::{NewUser, ProfileUpdate, Role, UserRecord};
