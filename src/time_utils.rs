// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time arithmetic.

use chrono::{DateTime, FixedOffset, Utc};

/// Whole calendar days between the date of `earlier` and the date of `now`,
/// both read in `zone`. Times of day are ignored, so 23:59 to 00:01 the
/// next morning counts as one day.
pub fn calendar_days_between(earlier: DateTime<Utc>, now: DateTime<Utc>, zone: FixedOffset) -> i64 {
    let from = earlier.with_timezone(&zone).date_naive();
    let to = now.with_timezone(&zone).date_naive();
    (to - from).num_days()
}
