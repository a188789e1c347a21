//! Derived lifecycle of a promo. Never stored; recomputed on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::promo::Promo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Scheduled,
    Active,
    Expired,
    Exhausted,
}

impl LifecycleState {
    pub fn is_active(self) -> bool {
        self == LifecycleState::Active
    }
}

/// Window bounds are calendar dates in UTC and both are inclusive: a promo
/// is live from the first second of `active_from` to the last second of
/// `active_until`.
pub fn evaluate(promo: &Promo, now: DateTime<Utc>) -> LifecycleState {
    let today = now.date_naive();

    if promo.active_from.is_some_and(|from| today < from) {
        return LifecycleState::Scheduled;
    }
    if promo.active_until.is_some_and(|until| today > until) {
        return LifecycleState::Expired;
    }

    let capacity = promo.capacity();
    if capacity == 0 || promo.used_count >= capacity {
        return LifecycleState::Exhausted;
    }

    LifecycleState::Active
}

pub fn is_active(promo: &Promo, now: DateTime<Utc>) -> bool {
    evaluate(promo, now).is_active()
}
