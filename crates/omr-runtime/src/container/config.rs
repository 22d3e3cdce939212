//! Coordinator configuration (§6.4).
//!
//! Loaded the way `shared_telemetry::TelemetryConfig::from_env` is: a
//! typed struct with explicit defaults, built from `OMR_*` environment
//! variables. `ledger.path` and `signers.registry_path` have no sane
//! default and are required; everything else falls back to spec.md
//! §6.4's literal defaults. [`AppConfig::load`] additionally accepts a
//! TOML file of the same shape for deployments that prefer a config
//! file over an environment block.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Errors building an [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("failed to read config file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Toml { path: PathBuf, source: toml::de::Error },
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str, field: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { field, message: format!("cannot parse {raw:?}") }),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub difficulty_hex_zeros: u8,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Required when `backend` is `sqlite`.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterSettings {
    pub quality_assessment_url: String,
    pub reconstruction_url: String,
    pub answer_key_verification_url: String,
    pub question_solving_url: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub total_budget_seconds: u64,
    pub rate_limit_per_second: u64,
    /// Use the scripted in-memory adapters instead of HTTP (local/dev only).
    #[serde(default)]
    pub use_fake: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    pub workers: usize,
    pub sheet_deadline_seconds: u64,
    #[serde(default = "default_ledger_contention_retries")]
    pub ledger_contention_retries: u32,
}

fn default_ledger_contention_retries() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationSettings {
    pub low_confidence_threshold: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    pub marks_tally_tolerance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerSettings {
    pub registry_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub listen_addr: SocketAddr,
    pub request_timeout_seconds: u64,
}

/// Complete coordinator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ledger: LedgerSettings,
    pub storage: StorageSettings,
    pub adapters: AdapterSettings,
    pub orchestrator: OrchestratorSettings,
    pub reconciliation: ReconciliationSettings,
    pub scoring: ScoringSettings,
    pub signers: SignerSettings,
    pub api: ApiSettings,
}

impl AppConfig {
    /// Build configuration from `OMR_*` environment variables, per §6.4.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ledger_path =
            env_var("OMR_LEDGER_PATH").ok_or(ConfigError::Missing("ledger.path (OMR_LEDGER_PATH)"))?;
        let registry_path = env_var("OMR_SIGNERS_REGISTRY_PATH")
            .ok_or(ConfigError::Missing("signers.registry_path (OMR_SIGNERS_REGISTRY_PATH)"))?;

        let storage_backend = match env_var("OMR_STORAGE_BACKEND").as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("sqlite") => StorageBackend::Sqlite,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    field: "storage.backend",
                    message: format!("unknown backend {other:?}"),
                })
            }
        };
        if storage_backend == StorageBackend::Sqlite && env_var("OMR_DATABASE_URL").is_none() {
            return Err(ConfigError::Missing("storage.database_url (OMR_DATABASE_URL)"));
        }

        Ok(Self {
            ledger: LedgerSettings {
                difficulty_hex_zeros: parse_env("OMR_LEDGER_DIFFICULTY_HEX_ZEROS", "ledger.difficulty_hex_zeros")?
                    .unwrap_or(0),
                path: PathBuf::from(ledger_path),
            },
            storage: StorageSettings { backend: storage_backend, database_url: env_var("OMR_DATABASE_URL") },
            adapters: AdapterSettings {
                quality_assessment_url: env_var("OMR_ADAPTER_QUALITY_URL")
                    .unwrap_or_else(|| "http://localhost:9001/quality".to_string()),
                reconstruction_url: env_var("OMR_ADAPTER_RECONSTRUCTION_URL")
                    .unwrap_or_else(|| "http://localhost:9002/reconstruct".to_string()),
                answer_key_verification_url: env_var("OMR_ADAPTER_VERIFY_URL")
                    .unwrap_or_else(|| "http://localhost:9003/verify".to_string()),
                question_solving_url: env_var("OMR_ADAPTER_SOLVE_URL")
                    .unwrap_or_else(|| "http://localhost:9004/solve".to_string()),
                timeout_seconds: parse_env("OMR_ADAPTER_TIMEOUT_SECONDS", "adapter.timeout_seconds")?
                    .unwrap_or(30),
                max_attempts: parse_env("OMR_ADAPTER_MAX_ATTEMPTS", "adapter.max_attempts")?.unwrap_or(3),
                total_budget_seconds: parse_env(
                    "OMR_ADAPTER_TOTAL_BUDGET_SECONDS",
                    "adapter.total_budget_seconds",
                )?
                .unwrap_or(90),
                rate_limit_per_second: parse_env(
                    "OMR_ADAPTER_RATE_LIMIT_PER_SECOND",
                    "adapter.rate_limit_per_second",
                )?
                .unwrap_or(10),
                use_fake: env_var("OMR_ADAPTER_USE_FAKE").map(|v| v == "true" || v == "1").unwrap_or(false),
            },
            orchestrator: OrchestratorSettings {
                workers: parse_env("OMR_ORCHESTRATOR_WORKERS", "orchestrator.workers")?
                    .unwrap_or_else(|| 4 * num_cpus::get()),
                sheet_deadline_seconds: parse_env(
                    "OMR_ORCHESTRATOR_SHEET_DEADLINE_SECONDS",
                    "orchestrator.sheet_deadline_seconds",
                )?
                .unwrap_or(600),
                ledger_contention_retries: parse_env(
                    "OMR_ORCHESTRATOR_LEDGER_CONTENTION_RETRIES",
                    "orchestrator.ledger_contention_retries",
                )?
                .unwrap_or(5),
            },
            reconciliation: ReconciliationSettings {
                low_confidence_threshold: env_var("OMR_RECONCILIATION_LOW_CONFIDENCE_THRESHOLD")
                    .map(|v| {
                        v.parse().map_err(|_| ConfigError::Invalid {
                            field: "reconciliation.low_confidence_threshold",
                            message: v,
                        })
                    })
                    .transpose()?
                    .unwrap_or(Decimal::new(7, 1)),
            },
            scoring: ScoringSettings {
                marks_tally_tolerance: env_var("OMR_SCORING_MARKS_TALLY_TOLERANCE")
                    .map(|v| {
                        v.parse().map_err(|_| ConfigError::Invalid {
                            field: "scoring.marks_tally_tolerance",
                            message: v,
                        })
                    })
                    .transpose()?
                    .unwrap_or(Decimal::new(1, 2)),
            },
            signers: SignerSettings { registry_path: PathBuf::from(registry_path) },
            api: ApiSettings {
                listen_addr: parse_env("OMR_API_LISTEN_ADDR", "api.listen_addr")?
                    .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("valid default listen addr")),
                request_timeout_seconds: parse_env(
                    "OMR_API_REQUEST_TIMEOUT_SECONDS",
                    "api.request_timeout_seconds",
                )?
                .unwrap_or(30),
            },
        })
    }

    /// Build configuration from a TOML file of the same shape as
    /// [`AppConfig`]'s fields, an overlay for deployments that prefer a
    /// config file to an environment block.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Toml { path, source: e })
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapters.timeout_seconds)
    }

    pub fn adapter_total_budget(&self) -> Duration {
        Duration::from_secs(self.adapters.total_budget_seconds)
    }

    pub fn sheet_deadline(&self) -> Duration {
        Duration::from_secs(self.orchestrator.sheet_deadline_seconds)
    }

    pub fn api_request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_seconds)
    }
}
