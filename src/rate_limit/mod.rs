//! Per-client request admission.
//!
//! # Data Flow
//! ```text
//! Request arrives
//!     → middleware.rs (extract client key, 401 if unidentifiable)
//!     → limiter.rs (find-or-create the client's bucket)
//!     → bucket.rs (refill by elapsed time, consume one token)
//!     → admitted, or 429
//!
//! Background:
//!     cleanup loop evicts buckets idle beyond TTL and fully refilled
//! ```
//!
//! # Design Decisions
//! - One registry lock for the maps, one mutex per bucket for token math;
//!   lock order is always registry → bucket
//! - Buckets keep their parameters until evicted; `update_config` only
//!   affects buckets created afterwards
//! - Critical sections are short and never cross an await point

pub mod bucket;
pub mod limiter;
pub mod middleware;

pub use bucket::Bucket;
pub use limiter::{ClientLimit, Limiter};
pub use middleware::rate_limit_middleware;
