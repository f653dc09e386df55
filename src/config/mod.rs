//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! configs/config.template.yaml + .env
//!     → template.rs (substitute recognized env vars)
//!     → rendered YAML (a cache, recreated on init)
//!     → schema.rs (serde parse, defaults for zero/empty fields)
//!     → Supervisor holds the current Arc<Config>
//!
//! On template or .env write:
//!     watcher (notify) → 500 ms debounce → re-render → reload
//!     → swap current config → each subscriber notified on its own task
//! ```
//!
//! # Design Decisions
//! - The supervisor is an explicit object passed by reference, not
//!   module-global state; one instance per process
//! - Reload failures keep the previous config in force
//! - A watcher backend error reopens the watcher with backoff instead of
//!   silently ending hot reload for the rest of the process

use thiserror::Error;

pub mod schema;
pub mod supervisor;
pub mod template;

pub use schema::{ClientOverride, Config, HealthCheckConfig, RateLimiterConfig, ServerConfig};
pub use supervisor::Supervisor;

/// Errors from loading or watching configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
