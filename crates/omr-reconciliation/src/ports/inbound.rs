use shared_types::{AISolverVerdict, AnswerKey, BubbleReading, ManualEntry, Reconciliation, SheetId};

use crate::domain::classify::InterventionTrigger;

/// The per-question interventions a reconciliation run decided to open.
#[derive(Debug, Clone)]
pub struct PendingIntervention {
    pub question_number: u32,
    pub trigger: InterventionTrigger,
}

/// The outcome of reconciling one sheet.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub reconciliation: Reconciliation,
    pub interventions: Vec<PendingIntervention>,
}

/// Three-way reconciliation over a sheet's bubble/AI/manual sources.
pub trait ReconciliationEngine: Send + Sync {
    fn reconcile(
        &self,
        sheet_id: SheetId,
        bubbles: &BubbleReading,
        ai: Option<&AISolverVerdict>,
        manual: Option<&ManualEntry>,
        key: &AnswerKey,
    ) -> ReconciliationOutcome;
}
