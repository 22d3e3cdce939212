use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use omr_store::Store;
use shared_types::{
    InterventionId, InterventionItem, InterventionPriority, InterventionReason, InterventionRef,
    InterventionStatus,
};
use time::OffsetDateTime;

use crate::domain::errors::InterventionError;
use crate::domain::queue::{NextFilter, QueueEntry};
use crate::ports::inbound::InterventionQueue;

/// Concrete intervention queue: authoritative state in the persistent
/// store, a `BinaryHeap` index for cheap `next()` lookups.
///
/// Claimed/resolved/cancelled items are removed from the index lazily:
/// marked in `removed` and skipped when popped, rather than searched for
/// and evicted, since `BinaryHeap` has no efficient arbitrary-element
/// removal.
pub struct InterventionService {
    store: Arc<dyn Store>,
    open_index: Mutex<BinaryHeap<QueueEntry>>,
    removed: Mutex<HashSet<InterventionId>>,
}

impl InterventionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            open_index: Mutex::new(BinaryHeap::new()),
            removed: Mutex::new(HashSet::new()),
        }
    }

    /// Rebuild the in-memory index from persisted open items. Call once
    /// at startup, after any crash or restart.
    pub async fn rehydrate(&self) -> Result<(), InterventionError> {
        let open = self
            .store
            .list_interventions(Some(InterventionStatus::Open), None, None)
            .await?;
        let mut heap = self.open_index.lock().expect("queue index poisoned");
        for item in open {
            heap.push(QueueEntry {
                id: item.id,
                priority: item.priority,
                created_at: item.created_at,
            });
        }
        Ok(())
    }

    fn mark_removed(&self, id: InterventionId) {
        self.removed.lock().expect("removed-set poisoned").insert(id);
    }

    /// After a lost compare-and-swap race, re-fetch the row to report
    /// what actually beat us to it rather than the stale precondition
    /// error the caller's own snapshot would have produced.
    async fn reclassify_conflict(&self, id: InterventionId) -> Result<InterventionError, InterventionError> {
        let current = self.store.get_intervention(id).await?.ok_or(InterventionError::NotFound(id))?;
        Ok(match current.status {
            InterventionStatus::Claimed => InterventionError::AlreadyClaimed {
                id,
                current_assignee: current.assignee,
            },
            other => InterventionError::AlreadyTerminal { id, status: other },
        })
    }
}

#[async_trait]
impl InterventionQueue for InterventionService {
    async fn enqueue(
        &self,
        entity_ref: InterventionRef,
        reason: InterventionReason,
        priority: InterventionPriority,
    ) -> Result<InterventionItem, InterventionError> {
        let now = OffsetDateTime::now_utc();
        let item = InterventionItem {
            id: InterventionId::new(),
            entity_ref,
            reason,
            priority,
            status: InterventionStatus::Open,
            assignee: None,
            resolution_note: None,
            created_at: now,
            updated_at: now,
        };
        self.store.put_intervention(item.clone()).await?;
        self.open_index.lock().expect("queue index poisoned").push(QueueEntry {
            id: item.id,
            priority: item.priority,
            created_at: item.created_at,
        });
        Ok(item)
    }

    async fn next(&self, filter: NextFilter) -> Result<Option<InterventionItem>, InterventionError> {
        let mut skipped = Vec::new();
        let matched = loop {
            let candidate = self.open_index.lock().expect("queue index poisoned").pop();
            let Some(entry) = candidate else {
                break None;
            };
            if self.removed.lock().expect("removed-set poisoned").contains(&entry.id) {
                continue;
            }
            if filter.matches(&entry) {
                break Some(entry);
            }
            skipped.push(entry);
        };

        {
            let mut heap = self.open_index.lock().expect("queue index poisoned");
            for entry in skipped {
                heap.push(entry);
            }
        }

        match matched {
            Some(entry) => Ok(self.store.get_intervention(entry.id).await?),
            None => Ok(None),
        }
    }

    async fn claim(&self, id: InterventionId, assignee: &str) -> Result<InterventionItem, InterventionError> {
        let item = self
            .store
            .get_intervention(id)
            .await?
            .ok_or(InterventionError::NotFound(id))?;

        match item.status {
            InterventionStatus::Open => {}
            InterventionStatus::Claimed => {
                return Err(InterventionError::AlreadyClaimed {
                    id,
                    current_assignee: item.assignee,
                });
            }
            other => return Err(InterventionError::AlreadyTerminal { id, status: other }),
        }

        let mut updated = item;
        updated.status = InterventionStatus::Claimed;
        updated.assignee = Some(assignee.to_string());
        updated.updated_at = OffsetDateTime::now_utc();

        // `item`'s status was only a snapshot; another caller may have
        // claimed it since. The store only commits the write if the row
        // is still `Open`, so at most one of two racing `claim` calls
        // on the same id ever wins.
        if !self
            .store
            .compare_and_swap_intervention(id, InterventionStatus::Open, updated.clone())
            .await?
        {
            return Err(self.reclassify_conflict(id).await?);
        }

        self.mark_removed(id);
        Ok(updated)
    }

    async fn resolve(
        &self,
        id: InterventionId,
        assignee: &str,
        resolution_note: String,
    ) -> Result<InterventionItem, InterventionError> {
        let item = self
            .store
            .get_intervention(id)
            .await?
            .ok_or(InterventionError::NotFound(id))?;

        match item.status {
            InterventionStatus::Claimed => {}
            other => return Err(InterventionError::AlreadyTerminal { id, status: other }),
        }
        if item.assignee.as_deref() != Some(assignee) {
            return Err(InterventionError::NotAssignee {
                id,
                expected: item.assignee.clone().unwrap_or_default(),
                got: assignee.to_string(),
            });
        }

        let mut updated = item;
        updated.status = InterventionStatus::Resolved;
        updated.resolution_note = Some(resolution_note);
        updated.updated_at = OffsetDateTime::now_utc();

        if !self
            .store
            .compare_and_swap_intervention(id, InterventionStatus::Claimed, updated.clone())
            .await?
        {
            return Err(self.reclassify_conflict(id).await?);
        }

        self.mark_removed(id);
        Ok(updated)
    }

    async fn cancel(&self, id: InterventionId) -> Result<InterventionItem, InterventionError> {
        let item = self
            .store
            .get_intervention(id)
            .await?
            .ok_or(InterventionError::NotFound(id))?;

        let expected_status = match item.status {
            InterventionStatus::Resolved | InterventionStatus::Cancelled => {
                return Err(InterventionError::AlreadyTerminal { id, status: item.status });
            }
            open_or_claimed => open_or_claimed,
        };

        let mut updated = item;
        updated.status = InterventionStatus::Cancelled;
        updated.updated_at = OffsetDateTime::now_utc();

        if !self
            .store
            .compare_and_swap_intervention(id, expected_status, updated.clone())
            .await?
        {
            return Err(self.reclassify_conflict(id).await?);
        }

        self.mark_removed(id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_store::InMemoryStore;
    use shared_types::SheetId;

    fn service() -> InterventionService {
        InterventionService::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_enqueue_then_next_returns_it() {
        let svc = service();
        let item = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::LowConfidence,
                InterventionPriority::Normal,
            )
            .await
            .unwrap();

        let next = svc.next(NextFilter::default()).await.unwrap().unwrap();
        assert_eq!(next.id, item.id);
    }

    #[tokio::test]
    async fn test_next_prefers_higher_priority() {
        let svc = service();
        svc.enqueue(
            InterventionRef::Sheet(SheetId::new()),
            InterventionReason::LowConfidence,
            InterventionPriority::Normal,
        )
        .await
        .unwrap();
        let critical = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::ReconciliationDispute,
                InterventionPriority::Critical,
            )
            .await
            .unwrap();

        let next = svc.next(NextFilter::default()).await.unwrap().unwrap();
        assert_eq!(next.id, critical.id);
    }

    #[tokio::test]
    async fn test_claim_then_resolve_lifecycle() {
        let svc = service();
        let item = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::LowConfidence,
                InterventionPriority::Normal,
            )
            .await
            .unwrap();

        let claimed = svc.claim(item.id, "grader-1").await.unwrap();
        assert_eq!(claimed.status, InterventionStatus::Claimed);

        // Not in `next()` candidacy anymore.
        assert!(svc.next(NextFilter::default()).await.unwrap().is_none());

        let resolved = svc.resolve(item.id, "grader-1", "fixed".into()).await.unwrap();
        assert_eq!(resolved.status, InterventionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_resolve_by_wrong_assignee_fails() {
        let svc = service();
        let item = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::LowConfidence,
                InterventionPriority::Normal,
            )
            .await
            .unwrap();
        svc.claim(item.id, "grader-1").await.unwrap();

        let err = svc.resolve(item.id, "grader-2", "oops".into()).await.unwrap_err();
        assert!(matches!(err, InterventionError::NotAssignee { .. }));
    }

    #[tokio::test]
    async fn test_double_claim_fails() {
        let svc = service();
        let item = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::LowConfidence,
                InterventionPriority::Normal,
            )
            .await
            .unwrap();
        svc.claim(item.id, "grader-1").await.unwrap();

        let err = svc.claim(item.id, "grader-2").await.unwrap_err();
        assert!(matches!(err, InterventionError::AlreadyClaimed { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_both_win() {
        let svc = Arc::new(service());
        let item = svc
            .enqueue(
                InterventionRef::Sheet(SheetId::new()),
                InterventionReason::LowConfidence,
                InterventionPriority::Normal,
            )
            .await
            .unwrap();

        let a = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.claim(item.id, "grader-1").await })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.claim(item.id, "grader-2").await })
        };
        let (a, b) = tokio::join!(a, b);
        let (a, b) = (a.unwrap(), b.unwrap());

        // Exactly one of the two racing claims wins; the loser sees
        // AlreadyClaimed rather than silently overwriting the winner.
        let outcomes = [a, b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one concurrent claim should succeed");
        let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(loser, Err(InterventionError::AlreadyClaimed { .. })));

        let winner = outcomes.into_iter().find(|r| r.is_ok()).unwrap().unwrap();
        let final_item = svc.store.get_intervention(item.id).await.unwrap().unwrap();
        assert_eq!(final_item.assignee, winner.assignee, "persisted state must match the winner, not a torn write");
    }
}
