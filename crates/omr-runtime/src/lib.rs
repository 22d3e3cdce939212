//! # Runtime (C7 wiring)
//!
//! The process entry point: reads [`container::AppConfig`], assembles
//! every port in [`container::AppContext`], and serves the `omr-api`
//! router. The main binary is a thin `main.rs`; this library exposes the
//! wiring for integration tests.

pub mod container;

pub use container::{AppConfig, AppContext, ConfigError, ContextError};
