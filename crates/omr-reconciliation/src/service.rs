use std::collections::BTreeMap;

use shared_types::{AISolverVerdict, AnswerKey, BubbleReading, ManualEntry, Reconciliation, SheetId};
use time::OffsetDateTime;

use crate::domain::classify::reconcile_question;
use crate::domain::policy::ReconciliationPolicy;
use crate::ports::inbound::{PendingIntervention, ReconciliationEngine, ReconciliationOutcome};

/// Stateless reconciliation engine. Pure function of its inputs; safe to
/// share across sheets and threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationService {
    policy: ReconciliationPolicy,
}

impl ReconciliationService {
    pub fn new(policy: ReconciliationPolicy) -> Self {
        Self { policy }
    }
}

impl ReconciliationEngine for ReconciliationService {
    fn reconcile(
        &self,
        sheet_id: SheetId,
        bubbles: &BubbleReading,
        ai: Option<&AISolverVerdict>,
        manual: Option<&ManualEntry>,
        key: &AnswerKey,
    ) -> ReconciliationOutcome {
        let mut questions = BTreeMap::new();
        let mut interventions = Vec::new();

        for (question_number, key_entry) in &key.entries {
            let bubble = bubbles.answers.get(question_number);
            let ai_answer = ai.and_then(|v| v.answers.get(question_number));
            let manual_answer = manual.and_then(|m| m.answers.get(question_number));

            let outcome = reconcile_question(
                bubble,
                ai_answer,
                manual_answer.map(|s| s.as_str()),
                key_entry,
                &self.policy,
            );

            if let Some(trigger) = outcome.intervention {
                interventions.push(PendingIntervention {
                    question_number: *question_number,
                    trigger,
                });
            }
            questions.insert(*question_number, outcome.reconciliation);
        }

        let now = OffsetDateTime::now_utc();
        ReconciliationOutcome {
            reconciliation: Reconciliation {
                sheet_id,
                questions,
                created_at: now,
                updated_at: now,
            },
            interventions,
        }
    }
}
