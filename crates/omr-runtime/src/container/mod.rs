pub mod config;
pub mod context;
pub mod signers;

pub use config::{AppConfig, ConfigError};
pub use context::{AppContext, ContextError};
