//! In-memory priority index over open interventions.
//!
//! A max-heap keyed by priority, then oldest-first among equal
//! priorities, mirroring the `BinaryHeap`-with-manual-`Ord` pattern used
//! for transaction selection elsewhere in this codebase. The
//! authoritative record lives in the persistent store; this index exists
//! only to make `next()` cheap.

use std::cmp::Ordering;

use shared_types::{InterventionId, InterventionPriority};
use time::OffsetDateTime;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueueEntry {
    pub id: InterventionId,
    pub priority: InterventionPriority,
    pub created_at: OffsetDateTime,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A filter applied when pulling the next open item off the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextFilter {
    pub min_priority: Option<InterventionPriority>,
}

impl NextFilter {
    pub fn matches(&self, entry: &QueueEntry) -> bool {
        self.min_priority.map(|min| entry.priority >= min).unwrap_or(true)
    }
}
