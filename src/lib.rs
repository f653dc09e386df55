//! HTTP reverse-proxy load balancer library.

pub mod balancer;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod observability;
pub mod rate_limit;

pub use balancer::{AtomicBalancer, BalancerError, Strategy};
pub use config::{Config, Supervisor};
pub use health::HealthChecker;
pub use http::HttpServer;
pub use rate_limit::Limiter;
