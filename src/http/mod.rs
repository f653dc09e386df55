//! HTTP entry point.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, trace + timeout layers)
//!     → rate-limit middleware (admission, 401/429)
//!     → proxy handler: balancer picks a backend
//!     → URI rewrite, forward via hyper client
//!     → backend response relayed to the client
//! ```

pub mod client_key;
pub mod server;

pub use server::HttpServer;
