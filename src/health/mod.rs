//! Active health checking subsystem.
//!
//! # Data Flow
//! ```text
//! start(parent token)
//!     → snapshot backends/interval/timeout/path
//!     → background loop:
//!         probe every backend in parallel (one-shot connections)
//!         → live set = backends answering 200 within the timeout
//!         → sort lexicographically
//!         → on_update callback (balancer replaces its list)
//!         → sleep(interval), or exit on cancellation
//! ```
//!
//! # Design Decisions
//! - Probe failures are per-round and non-fatal; each round is a fresh
//!   determination with no carried state
//! - The probe client never pools connections, so a sick backend cannot
//!   poison long-lived sockets
//! - The loop's cancel token races every in-flight probe; cancellation is
//!   observed at the socket, not only between rounds
//! - Reconfiguration is the explicit stop → update_config → start dance;
//!   update_config signals the running loop but never blocks the caller

pub mod checker;

pub use checker::{HealthChecker, LiveSetCallback};
