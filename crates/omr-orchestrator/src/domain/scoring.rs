//! Scoring (the `RECONCILED` → `SCORED` transition).
//!
//! Per-question marks follow §3: the key's full marks iff the reconciled
//! `final` answer equals the key's `expected_answer`, else zero. The
//! perfect-evaluation law is reproduced verbatim from §3's invariants.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use shared_types::{
    AnswerKey, BubbleReading, Grade, QualityRecord, QuestionScore, Reconciliation, ScoreResult,
    SheetId,
};
use time::OffsetDateTime;

/// Tolerance and grade-band configuration for scoring.
#[derive(Debug, Clone, Copy)]
pub struct ScoringPolicy {
    /// Maximum allowed drift between `manual_marks` and `automated_marks`
    /// for `marks_match` to hold (§6.4 `scoring.marks_tally_tolerance`).
    pub marks_tally_tolerance: Decimal,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            marks_tally_tolerance: Decimal::new(1, 2), // 0.01
        }
    }
}

fn grade_for(automated_marks: Decimal, max_marks: Decimal) -> Grade {
    if max_marks.is_zero() {
        return Grade::F;
    }
    let pct = (automated_marks / max_marks) * Decimal::ONE_HUNDRED;
    if pct >= Decimal::new(90, 0) {
        Grade::A
    } else if pct >= Decimal::new(75, 0) {
        Grade::B
    } else if pct >= Decimal::new(60, 0) {
        Grade::C
    } else if pct >= Decimal::new(40, 0) {
        Grade::D
    } else {
        Grade::F
    }
}

/// Compute the `ScoreResult` for a reconciled sheet.
///
/// `has_open_intervention` and `quality` are required to evaluate the
/// fourth and third conjuncts of the perfect-evaluation law, respectively;
/// they are not otherwise part of the scoring arithmetic.
pub fn score_sheet(
    sheet_id: SheetId,
    reconciliation: &Reconciliation,
    bubbles: &BubbleReading,
    quality: &QualityRecord,
    key: &AnswerKey,
    manual_marks: Option<Decimal>,
    has_open_intervention: bool,
    policy: &ScoringPolicy,
) -> ScoreResult {
    let mut breakdown = BTreeMap::new();
    let mut automated_marks = Decimal::ZERO;
    let mut max_marks = Decimal::ZERO;

    for (question_number, entry) in &key.entries {
        max_marks += entry.marks;
        let correct = reconciliation
            .questions
            .get(question_number)
            .and_then(|q| q.r#final.as_deref())
            .is_some_and(|answer| answer == entry.expected_answer);
        let marks_awarded = if correct { entry.marks } else { Decimal::ZERO };
        automated_marks += marks_awarded;
        breakdown.insert(*question_number, QuestionScore { marks_awarded, correct });
    }

    let marks_match = manual_marks
        .map(|manual| (manual - automated_marks).abs() <= policy.marks_tally_tolerance)
        .unwrap_or(true);

    let confidence_floor = Decimal::new(85, 2); // 0.85
    let all_confident = bubbles
        .answers
        .values()
        .all(|detection| detection.confidence >= confidence_floor);

    let is_perfect_evaluation =
        marks_match && all_confident && quality.score >= confidence_floor && !has_open_intervention;

    ScoreResult {
        sheet_id,
        automated_marks,
        manual_marks,
        marks_match,
        is_perfect_evaluation,
        grade: grade_for(automated_marks, max_marks),
        breakdown,
        created_at: OffsetDateTime::now_utc(),
    }
}
