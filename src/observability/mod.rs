//! Observability subsystem.
//!
//! Structured logging via the tracing crate. `RUST_LOG` wins over the
//! configured level; log output goes to the configured file when one is
//! set, stdout otherwise.

pub mod logging;
