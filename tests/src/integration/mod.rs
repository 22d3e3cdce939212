pub mod finalize_signing;
pub mod ledger_tamper;
pub mod crash_recovery;
pub mod intervention_gate;
