//! Per-sheet cooperative cancellation (§4.6, §5).
//!
//! A stage function polls its sheet's token at every I/O boundary and at
//! every adapter return. There is no forced preemption: cancellation is
//! observed, never injected.

use std::collections::HashMap;
use std::sync::Mutex;

use shared_types::SheetId;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<SheetId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the token for `sheet_id`.
    pub fn token_for(&self, sheet_id: SheetId) -> CancellationToken {
        self.tokens
            .lock()
            .expect("cancellation registry poisoned")
            .entry(sheet_id)
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Request cancellation of the sheet's in-flight stage, if any.
    pub fn cancel(&self, sheet_id: SheetId) {
        if let Some(token) = self.tokens.lock().expect("cancellation registry poisoned").get(&sheet_id) {
            token.cancel();
        }
    }

    pub fn is_cancelled(&self, sheet_id: SheetId) -> bool {
        self.tokens
            .lock()
            .expect("cancellation registry poisoned")
            .get(&sheet_id)
            .is_some_and(|t| t.is_cancelled())
    }

    /// Reset the token after a stage observes cancellation, so the sheet
    /// can be retried.
    pub fn reset(&self, sheet_id: SheetId) {
        self.tokens
            .lock()
            .expect("cancellation registry poisoned")
            .insert(sheet_id, CancellationToken::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed_via_same_token() {
        let registry = CancellationRegistry::new();
        let sheet_id = SheetId::new();
        let token = registry.token_for(sheet_id);
        assert!(!token.is_cancelled());

        registry.cancel(sheet_id);
        assert!(registry.is_cancelled(sheet_id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_reset_clears_cancellation() {
        let registry = CancellationRegistry::new();
        let sheet_id = SheetId::new();
        registry.token_for(sheet_id);
        registry.cancel(sheet_id);
        assert!(registry.is_cancelled(sheet_id));

        registry.reset(sheet_id);
        assert!(!registry.is_cancelled(sheet_id));
    }
}
