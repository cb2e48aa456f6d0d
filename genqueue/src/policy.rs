//! Deterministic selection ordering for processing passes.
//!
//! Day-1 scenarios are user-blocking, so they sort ahead of everything
//! else; after that, jobs with the earliest target date come first, then
//! curriculum order for day jobs, then FIFO on creation time. The ordering
//! is total (ties broken by id) so a limited-capacity pass always makes
//! forward progress on the same jobs.

use std::cmp::Ordering;

use crate::job::{JobTarget, QueueJob};

/// Sort comparator over a snapshot of pending jobs.
pub fn selection_order(a: &QueueJob, b: &QueueJob) -> Ordering {
    priority_class(a)
        .cmp(&priority_class(b))
        .then_with(|| compare_target_dates(a, b))
        .then_with(|| curriculum_rank(a).cmp(&curriculum_rank(b)))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| i64::from(a.id).cmp(&i64::from(b.id)))
}

fn priority_class(job: &QueueJob) -> u8 {
    if job.target.is_day_one() {
        0
    } else {
        1
    }
}

// Undated day jobs still process in curriculum order, not in whatever
// order provisioning happened to insert them; seeds have no inherent
// order and fall through to creation time.
fn curriculum_rank(job: &QueueJob) -> (u8, u32) {
    match &job.target {
        JobTarget::Day(day) => (0, *day),
        JobTarget::Seed(_) => (1, 0),
    }
}

// Jobs without a target date sort after dated ones.
fn compare_target_dates(a: &QueueJob, b: &QueueJob) -> Ordering {
    match (a.target_date, b.target_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
