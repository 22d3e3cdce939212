//! Per-question three-way tally, per §4.4.
//!
//! Precedence, in order:
//! 1. Missing bubble reading → `needs_review`.
//! 2. An indeterminate bubble value (`none`/`multiple` marks) → `needs_review`,
//!    since no concrete `final` can be derived. Not explicitly named in the
//!    governing rules; treated the same as a missing bubble since both leave
//!    reconciliation without a usable bubble value.
//! 3. AI and manual both absent → provisional `matched` against the key, or
//!    `needs_review` if the bubble disagrees with the key.
//! 4. All three sources present: exact-match table below.
//! 5. Exactly one of AI/manual present: `matched` if it agrees with the
//!    bubble, else `needs_review` (two sources disagreeing with no tiebreaker).
//! 6. Low bubble confidence overrides every other outcome to `needs_review`.

use shared_types::{
    AnswerKeyEntry, BubbleDetection, DetectedAnswer, InterventionPriority, InterventionReason,
    QuestionReconciliation, ReconciliationStatus, SolverAnswer,
};

use crate::domain::policy::ReconciliationPolicy;

/// Whether a classified question should open an intervention, and at what
/// priority, per §4.4 ("interventions open only when reconciliation cannot
/// decide a final").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterventionTrigger {
    pub reason: InterventionReason,
    pub priority: InterventionPriority,
}

/// The result of classifying one question.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub reconciliation: QuestionReconciliation,
    pub intervention: Option<InterventionTrigger>,
}

fn bubble_value(detection: &BubbleDetection) -> Option<String> {
    match &detection.detected_answer {
        DetectedAnswer::Option(answer) => Some(answer.clone()),
        DetectedAnswer::None | DetectedAnswer::Multiple => None,
    }
}

fn needs_review(omr: Option<String>, ai: Option<String>, manual: Option<String>) -> QuestionOutcome {
    QuestionOutcome {
        reconciliation: QuestionReconciliation {
            omr,
            ai,
            manual,
            r#final: None,
            status: ReconciliationStatus::NeedsReview,
        },
        intervention: Some(InterventionTrigger {
            reason: InterventionReason::ReconciliationDispute,
            priority: InterventionPriority::Normal,
        }),
    }
}

/// Classify a single question given its bubble, optional AI, and optional
/// manual answers against the locked key entry.
pub fn reconcile_question(
    bubble: Option<&BubbleDetection>,
    ai: Option<&SolverAnswer>,
    manual: Option<&str>,
    key_entry: &AnswerKeyEntry,
    policy: &ReconciliationPolicy,
) -> QuestionOutcome {
    let ai_answer = ai.map(|a| a.answer.clone());
    let manual_answer = manual.map(|m| m.to_string());

    let Some(detection) = bubble else {
        return needs_review(None, ai_answer, manual_answer);
    };

    let Some(b) = bubble_value(detection) else {
        return needs_review(None, ai_answer, manual_answer);
    };

    let mut outcome = match (&ai_answer, &manual_answer) {
        (None, None) => {
            if b == key_entry.expected_answer {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: None,
                        manual: None,
                        r#final: Some(b),
                        status: ReconciliationStatus::Matched,
                    },
                    intervention: None,
                }
            } else {
                needs_review(Some(b), None, None)
            }
        }
        (Some(a), Some(m)) => {
            if &b == a && &b == m {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: Some(a.clone()),
                        manual: Some(m.clone()),
                        r#final: Some(b),
                        status: ReconciliationStatus::Matched,
                    },
                    intervention: None,
                }
            } else if &b == m && &b != a {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: Some(a.clone()),
                        manual: Some(m.clone()),
                        r#final: Some(b),
                        status: ReconciliationStatus::DisputedAi,
                    },
                    intervention: None,
                }
            } else if &b == a && &b != m {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: Some(a.clone()),
                        manual: Some(m.clone()),
                        r#final: Some(b),
                        status: ReconciliationStatus::DisputedManual,
                    },
                    intervention: Some(InterventionTrigger {
                        reason: InterventionReason::ReconciliationDispute,
                        priority: InterventionPriority::Normal,
                    }),
                }
            } else if a != m {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b),
                        ai: Some(a.clone()),
                        manual: Some(m.clone()),
                        r#final: None,
                        status: ReconciliationStatus::ThreeWaySplit,
                    },
                    intervention: Some(InterventionTrigger {
                        reason: InterventionReason::ReconciliationDispute,
                        priority: InterventionPriority::High,
                    }),
                }
            } else {
                // a == m != b: the two external sources agree against the
                // bubble. Not named explicitly in §4.4; treated as
                // undecidable rather than guessed.
                needs_review(Some(b), Some(a.clone()), Some(m.clone()))
            }
        }
        (Some(a), None) => {
            if &b == a {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: Some(a.clone()),
                        manual: None,
                        r#final: Some(b),
                        status: ReconciliationStatus::Matched,
                    },
                    intervention: None,
                }
            } else {
                needs_review(Some(b), Some(a.clone()), None)
            }
        }
        (None, Some(m)) => {
            if &b == m {
                QuestionOutcome {
                    reconciliation: QuestionReconciliation {
                        omr: Some(b.clone()),
                        ai: None,
                        manual: Some(m.clone()),
                        r#final: Some(b),
                        status: ReconciliationStatus::Matched,
                    },
                    intervention: None,
                }
            } else {
                needs_review(Some(b), None, Some(m.clone()))
            }
        }
    };

    if detection.confidence < policy.low_confidence_threshold {
        outcome = needs_review(
            outcome.reconciliation.omr.clone(),
            outcome.reconciliation.ai.clone(),
            outcome.reconciliation.manual.clone(),
        );
    }

    outcome
}
