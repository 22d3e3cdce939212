use async_trait::async_trait;
use shared_types::{InterventionId, InterventionItem, InterventionPriority, InterventionReason, InterventionRef};

use crate::domain::errors::InterventionError;
use crate::domain::queue::NextFilter;

/// The intervention queue's API (§4.5): `open → claimed → resolved`, with
/// `cancelled` reachable from any non-terminal state.
#[async_trait]
pub trait InterventionQueue: Send + Sync {
    async fn enqueue(
        &self,
        entity_ref: InterventionRef,
        reason: InterventionReason,
        priority: InterventionPriority,
    ) -> Result<InterventionItem, InterventionError>;

    /// The highest-priority open item matching `filter`, oldest first on ties.
    async fn next(&self, filter: NextFilter) -> Result<Option<InterventionItem>, InterventionError>;

    /// Atomically claim an open item for `assignee`.
    async fn claim(&self, id: InterventionId, assignee: &str) -> Result<InterventionItem, InterventionError>;

    /// Resolve a claimed item; only its assignee may do so.
    async fn resolve(
        &self,
        id: InterventionId,
        assignee: &str,
        resolution_note: String,
    ) -> Result<InterventionItem, InterventionError>;

    /// Abandon a non-terminal item without a resolution.
    async fn cancel(&self, id: InterventionId) -> Result<InterventionItem, InterventionError>;
}
