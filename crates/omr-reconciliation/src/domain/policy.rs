use rust_decimal::Decimal;

/// Tunable thresholds for the reconciliation engine.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationPolicy {
    /// Bubble-detection confidence below which a question is forced to
    /// `needs_review` regardless of agreement between sources.
    pub low_confidence_threshold: Decimal,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            // 0.7, per §4.4.
            low_confidence_threshold: Decimal::new(7, 1),
        }
    }
}
