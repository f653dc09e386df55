//! Strategy construction from configuration.

use crate::balancer::{Random, RoundRobin, Strategy};

pub const ROUND_ROBIN: &str = "round-robin";
pub const RANDOM: &str = "random";

/// Build a strategy by name. Unknown names fall back to round-robin.
pub fn create(strategy: &str, backends: &[String]) -> Box<dyn Strategy> {
    match strategy {
        ROUND_ROBIN => Box::new(RoundRobin::new(backends)),
        RANDOM => Box::new(Random::new(backends)),
        other => {
            tracing::warn!(strategy = %other, "unknown strategy, using round-robin");
            Box::new(RoundRobin::new(backends))
        }
    }
}
