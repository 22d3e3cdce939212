//! Application context: wires every C1-C6 port to a concrete
//! implementation and assembles the `omr-api` router, in dependency
//! order, mirroring `node-runtime`'s `SubsystemContainer` (level-ordered
//! initialization with a `tracing::info!` line per phase).
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: signer registry, ledger chain store
//! Level 1: persistent store, external-service adapters
//! Level 2: reconciliation engine, intervention queue
//! Level 3: orchestrator (depends on everything above)
//! Level 4: HTTP router
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use omr_adapters::{
    FakeAnswerKeyVerifier, FakeQualityAssessor, FakeQuestionSolver, FakeReconstructor,
    HttpAnswerKeyVerifier, HttpQualityAssessor, HttpQuestionSolver, HttpReconstructor, RetryConfig,
};
use omr_api::{build_router, AppState};
use omr_intervention::InterventionService;
use omr_ledger::{DifficultyConfig, FileChainStore, LedgerConfig, LedgerService, SignaturePolicy};
use omr_orchestrator::{OrchestratorConfig, OrchestratorService};
use omr_reconciliation::{ReconciliationPolicy, ReconciliationService};
use omr_store::{InMemoryStore, SqliteStore, Store};
use shared_types::RateLimiter;

use crate::container::config::{AppConfig, StorageBackend};
use crate::container::signers::load_signer_registry;

/// Errors that can occur assembling the application context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to open ledger file {0}")]
    Ledger(#[from] omr_ledger::ChainError),
    #[error("failed to load signer registry: {0}")]
    Signers(String),
    #[error("failed to connect to database: {0}")]
    Storage(#[from] shared_types::StorageError),
}

/// Everything the process needs to serve requests: the ledger behind its
/// single-writer mutex, the persistent store, and the fully-wired
/// orchestrator, plus the router built over all of it.
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub ledger: Arc<AsyncMutex<dyn omr_ledger::LedgerApi + Send>>,
    pub interventions: Arc<InterventionService>,
    pub orchestrator: Arc<dyn omr_orchestrator::Orchestrator>,
    pub config: AppConfig,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> Result<Self, ContextError> {
        info!("assembling application context");

        // Level 0: signer registry, ledger chain store.
        let registry = load_signer_registry(&config.signers.registry_path)
            .map_err(ContextError::Signers)?;
        info!(signer_kinds = registry.len(), "signer registry loaded");

        let chain_store = FileChainStore::open(&config.ledger.path)?;
        let ledger_config = LedgerConfig {
            difficulty: DifficultyConfig {
                leading_zero_hex_digits: config.ledger.difficulty_hex_zeros,
                ..DifficultyConfig::default()
            },
        };
        let ledger_service = LedgerService::new(chain_store, SignaturePolicy::new(registry), ledger_config);
        let ledger: Arc<AsyncMutex<dyn omr_ledger::LedgerApi + Send>> =
            Arc::new(AsyncMutex::new(ledger_service));
        info!("ledger opened");

        // Level 1: persistent store, external-service adapters.
        let store: Arc<dyn Store> = match config.storage.backend {
            StorageBackend::Memory => {
                info!("persistent store: in-memory (not for production)");
                Arc::new(InMemoryStore::new())
            }
            StorageBackend::Sqlite => {
                let url = config
                    .storage
                    .database_url
                    .as_deref()
                    .expect("from_env/load enforce database_url for the sqlite backend");
                info!("persistent store: sqlite");
                Arc::new(SqliteStore::connect(url).await?)
            }
        };

        let retry = RetryConfig {
            request_timeout: config.adapter_timeout(),
            max_attempts: config.adapters.max_attempts,
            total_budget: config.adapter_total_budget(),
            initial_backoff: Duration::from_millis(200),
        };
        let rate = config.adapters.rate_limit_per_second;

        let (quality_assessor, reconstructor, key_verifier, solver): (
            Arc<dyn omr_adapters::QualityAssessor>,
            Arc<dyn omr_adapters::Reconstructor>,
            Arc<dyn omr_adapters::AnswerKeyVerifier>,
            Arc<dyn omr_adapters::QuestionSolver>,
        ) = if config.adapters.use_fake {
            info!("external-service adapters: scripted fakes (not for production)");
            (
                Arc::new(FakeQualityAssessor::always_proceed()),
                Arc::new(FakeReconstructor::scripted(vec![Ok(omr_adapters::ReconstructionResult {
                    image_bytes: vec![],
                    confidence: rust_decimal::Decimal::ONE,
                })])),
                Arc::new(FakeAnswerKeyVerifier::scripted(vec![Ok(omr_adapters::AnswerKeyVerification {
                    agrees: true,
                    confidence: rust_decimal::Decimal::ONE,
                    notes: None,
                })])),
                Arc::new(FakeQuestionSolver::scripted(vec![Ok(omr_adapters::SolverOutcome {
                    answer: String::new(),
                    confidence: rust_decimal::Decimal::ONE,
                    explanation: None,
                })])),
            )
        } else {
            info!("external-service adapters: HTTP");
            (
                Arc::new(HttpQualityAssessor::with_config(
                    &config.adapters.quality_assessment_url,
                    retry,
                    RateLimiter::new(rate * 2, rate),
                )),
                Arc::new(HttpReconstructor::with_config(
                    &config.adapters.reconstruction_url,
                    retry,
                    RateLimiter::new(rate * 2, rate),
                )),
                Arc::new(HttpAnswerKeyVerifier::with_config(
                    &config.adapters.answer_key_verification_url,
                    retry,
                    RateLimiter::new(rate * 2, rate),
                )),
                Arc::new(HttpQuestionSolver::with_config(
                    &config.adapters.question_solving_url,
                    retry,
                    RateLimiter::new(rate * 2, rate),
                )),
            )
        };

        // Level 2: reconciliation engine, intervention queue.
        let reconciliation: Arc<dyn omr_reconciliation::ReconciliationEngine> = Arc::new(
            ReconciliationService::new(ReconciliationPolicy {
                low_confidence_threshold: config.reconciliation.low_confidence_threshold,
            }),
        );

        let interventions = Arc::new(InterventionService::new(Arc::clone(&store)));
        interventions.rehydrate().await.map_err(|e| ContextError::Signers(e.to_string()))?;
        info!("intervention queue rehydrated from persisted open items");

        // Level 3: orchestrator.
        let orchestrator_config = OrchestratorConfig {
            sheet_deadline: config.sheet_deadline(),
            worker_permits: config.orchestrator.workers,
            ledger_contention_retries: config.orchestrator.ledger_contention_retries,
        };
        let orchestrator: Arc<dyn omr_orchestrator::Orchestrator> = Arc::new(OrchestratorService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            quality_assessor,
            reconstructor,
            solver,
            key_verifier,
            reconciliation,
            interventions.clone() as Arc<dyn omr_intervention::InterventionQueue>,
            orchestrator_config,
        ));
        info!(workers = orchestrator_config.worker_permits, "orchestrator wired");

        Ok(Self { store, ledger, interventions, orchestrator, config })
    }

    /// Build the `omr-api` router over this context.
    pub fn router(&self) -> axum::Router {
        build_router(
            AppState {
                orchestrator: Arc::clone(&self.orchestrator),
                store: Arc::clone(&self.store),
                ledger: Arc::clone(&self.ledger),
                interventions: self.interventions.clone() as Arc<dyn omr_intervention::InterventionQueue>,
            },
            self.config.api_request_timeout(),
        )
    }
}
