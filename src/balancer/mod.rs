//! Backend selection subsystem.
//!
//! # Data Flow
//! ```text
//! Health checker round completes
//!     → AtomicBalancer::update (forwarded to the active strategy)
//!
//! Request admitted
//!     → AtomicBalancer::next
//!     → active strategy picks a backend:
//!         - round_robin.rs (rotate through the live set)
//!         - random.rs (uniform pick from the live set)
//!     → backend URL or NoHealthyBackends
//! ```
//!
//! # Design Decisions
//! - Strategies are internally synchronized; callers share them behind `Arc`
//! - The active strategy lives in an `ArcSwap` cell: `next` is hot and
//!   strategy replacement is rare, so readers never take a global lock
//! - Strategies are never mutated from outside after publication

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

pub mod factory;
pub mod random;
pub mod round_robin;

pub use random::Random;
pub use round_robin::RoundRobin;

/// Errors surfaced by backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    #[error("no healthy backends available")]
    NoHealthyBackends,
}

/// A backend selection policy over the current live set.
pub trait Strategy: Send + Sync {
    /// Pick the next backend.
    fn next(&self) -> Result<String, BalancerError>;

    /// Replace the list the strategy draws from. After `update` returns,
    /// subsequent `next` calls see only the new list.
    fn update(&self, backends: &[String]);
}

/// An atomically swappable cell holding the active [`Strategy`].
///
/// `next` and `update` load the current strategy and delegate. Replacing
/// the strategy is a single pointer-width store; in-flight callers finish
/// against the strategy they loaded.
pub struct AtomicBalancer {
    strategy: ArcSwap<Box<dyn Strategy>>,
}

impl AtomicBalancer {
    pub fn new(initial: Box<dyn Strategy>) -> Self {
        Self {
            strategy: ArcSwap::from_pointee(initial),
        }
    }

    pub fn next(&self) -> Result<String, BalancerError> {
        self.strategy.load().next()
    }

    pub fn update(&self, backends: &[String]) {
        self.strategy.load().update(backends)
    }

    /// Atomically replace the active strategy.
    pub fn set_strategy(&self, strategy: Box<dyn Strategy>) {
        self.strategy.store(Arc::new(strategy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn delegates_to_active_strategy() {
        let ab = AtomicBalancer::new(Box::new(RoundRobin::new(&addrs(&["a", "b"]))));
        assert_eq!(ab.next().unwrap(), "a");
        assert_eq!(ab.next().unwrap(), "b");
        assert_eq!(ab.next().unwrap(), "a");
    }

    #[test]
    fn set_strategy_takes_effect_for_subsequent_calls() {
        let ab = AtomicBalancer::new(Box::new(RoundRobin::new(&addrs(&["a", "b"]))));
        assert_eq!(ab.next().unwrap(), "a");

        ab.set_strategy(Box::new(RoundRobin::new(&addrs(&["x", "y"]))));
        assert_eq!(ab.next().unwrap(), "x");
        assert_eq!(ab.next().unwrap(), "y");
    }

    #[test]
    fn update_reaches_active_strategy() {
        let ab = AtomicBalancer::new(Box::new(RoundRobin::new(&addrs(&["a", "b", "c"]))));
        ab.update(&addrs(&["a", "c"]));
        assert_eq!(ab.next().unwrap(), "a");
        assert_eq!(ab.next().unwrap(), "c");
        assert_eq!(ab.next().unwrap(), "a");
    }

    /// Under continuous swapping between two strategies with disjoint lists,
    /// every observed value belongs to exactly one of the lists.
    #[test]
    fn no_torn_reads_under_concurrent_swap() {
        let first: HashSet<String> = addrs(&["a1", "a2", "a3"]).into_iter().collect();
        let second: HashSet<String> = addrs(&["b1", "b2"]).into_iter().collect();

        let ab = Arc::new(AtomicBalancer::new(Box::new(RoundRobin::new(&addrs(&[
            "a1", "a2", "a3",
        ])))));
        let stop = Arc::new(AtomicBool::new(false));

        let swapper = {
            let ab = Arc::clone(&ab);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut flip = false;
                while !stop.load(Ordering::Relaxed) {
                    let list = if flip {
                        addrs(&["a1", "a2", "a3"])
                    } else {
                        addrs(&["b1", "b2"])
                    };
                    ab.set_strategy(Box::new(RoundRobin::new(&list)));
                    flip = !flip;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ab = Arc::clone(&ab);
                let first = first.clone();
                let second = second.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let picked = ab.next().unwrap();
                        assert!(
                            first.contains(&picked) ^ second.contains(&picked),
                            "torn value: {picked}"
                        );
                    }
                })
            })
            .collect();

        for r in readers {
            r.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        swapper.join().unwrap();
    }
}
