// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tree growth arithmetic.
//!
//! Watering moves score into tree progress; every full
//! [`TREE_GROWTH_THRESHOLD`] units of progress becomes one grown tree.
//! Everything here is pure; a store transaction may run it more than once.

use serde::Serialize;

use crate::error::AppError;
use crate::models::UserRecord;

/// Progress units needed to grow one tree.
pub const TREE_GROWTH_THRESHOLD: i64 = 1000;

/// The counters touched by watering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub score: i64,
    pub tree_progress: i64,
    pub number_tree: i64,
}

impl From<&UserRecord> for Counters {
    fn from(user: &UserRecord) -> Self {
        Self {
            score: user.score,
            tree_progress: user.tree_progress,
            number_tree: user.number_tree,
        }
    }
}

/// Spend `amount` score on tree progress.
///
/// Fails with `InsufficientScore` when the score cannot cover the amount;
/// in that case nothing should be written. Progress crossing the threshold
/// several times in one call credits one tree per crossing. An amount that
/// would overflow the progress or tree counters is a `BadRequest`.
pub fn apply_watering(current: Counters, amount: i64) -> Result<Counters, AppError> {
    if amount <= 0 {
        return Err(AppError::BadRequest("Amount must be positive".to_string()));
    }
    if current.score < amount {
        return Err(AppError::InsufficientScore {
            available: current.score,
            requested: amount,
        });
    }

    let overflow = || AppError::BadRequest("Amount overflows tree progress".to_string());
    let progress = current
        .tree_progress
        .checked_add(amount)
        .ok_or_else(overflow)?;
    let grown = progress.div_euclid(TREE_GROWTH_THRESHOLD);

    Ok(Counters {
        score: current.score - amount,
        tree_progress: progress.rem_euclid(TREE_GROWTH_THRESHOLD),
        number_tree: current.number_tree.checked_add(grown).ok_or_else(overflow)?,
    })
}
