//! Application state and route table (§6.1).
//!
//! `AppState` holds the four ports this surface talks to: the
//! orchestrator owns every write, `Store` and `LedgerApi` back the
//! read-only `GET` endpoints, and `InterventionQueue` backs
//! claim/resolve.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex as AsyncMutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use omr_intervention::InterventionQueue;
use omr_ledger::LedgerApi;
use omr_orchestrator::Orchestrator;
use omr_store::Store;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<dyn Orchestrator>,
    pub store: Arc<dyn Store>,
    pub ledger: Arc<AsyncMutex<dyn LedgerApi + Send>>,
    pub interventions: Arc<dyn InterventionQueue>,
}

/// Build the full route table with the ambient middleware stack: a
/// tracing span per request, a request timeout, and CORS (§6.1 "ambient
/// additions").
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/papers", post(handlers::papers::create_paper))
        .route("/papers/:id", get(handlers::papers::get_paper))
        .route("/keys", post(handlers::keys::submit_key))
        .route("/keys/:id", get(handlers::keys::get_key))
        .route("/keys/:id/verify", post(handlers::keys::verify_key))
        .route("/keys/:id/approve", post(handlers::keys::approve_key))
        .route("/keys/:id/lock", post(handlers::keys::lock_key))
        .route("/sheets", post(handlers::sheets::ingest))
        .route("/sheets/:id", get(handlers::sheets::get_sheet))
        .route("/sheets/:id/quality", post(handlers::sheets::assess_quality))
        .route("/sheets/:id/reconstruct", post(handlers::sheets::reconstruct))
        .route("/sheets/:id/bubbles", post(handlers::sheets::record_bubbles))
        .route("/sheets/:id/ai-solve", post(handlers::sheets::ai_solve))
        .route("/sheets/:id/manual", post(handlers::sheets::manual_entry))
        .route("/sheets/:id/reconcile", post(handlers::sheets::reconcile))
        .route("/sheets/:id/score", post(handlers::sheets::score))
        .route("/sheets/:id/finalize", post(handlers::sheets::finalize))
        .route("/workflow/complete", post(handlers::sheets::workflow_complete))
        .route("/ledger/status", get(handlers::ledger::status))
        .route("/ledger/blocks", get(handlers::ledger::list_blocks))
        .route("/ledger/block/:hash", get(handlers::ledger::get_block))
        .route("/ledger/validate", get(handlers::ledger::validate))
        .route("/interventions", get(handlers::interventions::list))
        .route("/interventions/:id/claim", post(handlers::interventions::claim))
        .route("/interventions/:id/resolve", post(handlers::interventions::resolve))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}
