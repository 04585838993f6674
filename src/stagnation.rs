//! Stagnation monitor: nudges suppliers to place a final competitive bid
//! when the best supplier of some product has stopped moving right before
//! the close. Purely advisory, never touches the ledger.

use chrono::{DateTime, Duration, Utc};

use crate::ledger::Project;

/// Warnings only show inside the last hour before the deadline.
const FINAL_WINDOW_MINUTES: i64 = 60;

/// A best supplier unchanged for this long counts as stagnant.
const STALE_AFTER_MINUTES: i64 = 15;

pub fn should_warn(project: &Project, now: DateTime<Utc>) -> bool {
    if project.is_closed(now) {
        return false;
    }
    if project.deadline - now > Duration::minutes(FINAL_WINDOW_MINUTES) {
        return false;
    }
    project.products.values().any(|product| {
        product
            .best_supplier_changed_at
            .map_or(false, |changed_at| {
                now - changed_at > Duration::minutes(STALE_AFTER_MINUTES)
            })
    })
}
