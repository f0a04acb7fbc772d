//! Frequency evaluation — pure functions deciding whether a task's
//! window has elapsed and when it runs next.
//!
//! The due predicate is the sole execution gate; `next_run_at` is
//! advisory and only consumed by card readers.

use chrono::{DateTime, Duration, Utc};

use crate::tasks::{Frequency, TaskDefinition, TaskState};

/// True when the frequency window has elapsed (with the grace
/// margin) or the task has never run.
pub fn is_due(frequency: Frequency, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_run_at {
        None => true,
        Some(last) => {
            let elapsed = (now - last).num_seconds();
            elapsed >= frequency.interval_secs() - frequency.grace_secs()
        }
    }
}

/// Advisory next-run instant: `now + canonical interval`.
pub fn compute_next_run(now: DateTime<Utc>, frequency: Frequency) -> DateTime<Utc> {
    now + Duration::seconds(frequency.interval_secs())
}

/// A task is eligible iff enabled and due.
pub fn is_eligible(def: &TaskDefinition, state: Option<&TaskState>, now: DateTime<Utc>) -> bool {
    if !def.enabled {
        return false;
    }
    is_due(def.frequency, state.and_then(|s| s.last_run_at), now)
}
