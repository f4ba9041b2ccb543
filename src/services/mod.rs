// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod admin;
pub mod credentials;
pub mod leaderboard;
pub mod ledger;

pub use admin::{AdminOperator, UserSummary};
pub use credentials::{Claims, SessionTokens};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use ledger::{LoginOutcome, ProgressLedger};
