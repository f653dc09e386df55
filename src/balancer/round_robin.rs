//! Round-robin backend selection.
//!
//! Rotates through the current list in order. The cursor resets to the
//! head whenever the list itself changes, so a fresh live set always
//! starts from its first element.

use std::sync::Mutex;

use crate::balancer::{BalancerError, Strategy};

pub struct RoundRobin {
    state: Mutex<State>,
}

struct State {
    backends: Vec<String>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new(backends: &[String]) -> Self {
        Self {
            state: Mutex::new(State {
                backends: backends.to_vec(),
                cursor: 0,
            }),
        }
    }
}

impl Strategy for RoundRobin {
    fn next(&self) -> Result<String, BalancerError> {
        let mut state = self.state.lock().expect("round-robin mutex poisoned");
        if state.backends.is_empty() {
            return Err(BalancerError::NoHealthyBackends);
        }

        let picked = state.backends[state.cursor].clone();
        state.cursor = (state.cursor + 1) % state.backends.len();
        Ok(picked)
    }

    fn update(&self, backends: &[String]) {
        let mut state = self.state.lock().expect("round-robin mutex poisoned");

        // A changed list restarts the rotation from its head.
        if state.backends != backends {
            state.cursor = 0;
        }

        state.backends = backends.to_vec();
        if !state.backends.is_empty() && state.cursor >= state.backends.len() {
            state.cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cycles_in_order() {
        let rr = RoundRobin::new(&addrs(&["a", "b", "c"]));
        let picks: Vec<_> = (0..6).map(|_| rr.next().unwrap()).collect();
        assert_eq!(picks, addrs(&["a", "b", "c", "a", "b", "c"]));
    }

    #[test]
    fn empty_list_is_an_error() {
        let rr = RoundRobin::new(&[]);
        assert_eq!(rr.next(), Err(BalancerError::NoHealthyBackends));
    }

    #[test]
    fn changed_list_restarts_from_head() {
        let rr = RoundRobin::new(&addrs(&["a", "b", "c"]));
        rr.next().unwrap();
        rr.next().unwrap();

        rr.update(&addrs(&["b", "c"]));
        assert_eq!(rr.next().unwrap(), "b");
        assert_eq!(rr.next().unwrap(), "c");
        assert_eq!(rr.next().unwrap(), "b");
    }

    #[test]
    fn identical_update_keeps_the_cursor() {
        let rr = RoundRobin::new(&addrs(&["a", "b", "c"]));
        rr.next().unwrap();

        rr.update(&addrs(&["a", "b", "c"]));
        assert_eq!(rr.next().unwrap(), "b");
    }

    #[test]
    fn update_to_empty_then_refill() {
        let rr = RoundRobin::new(&addrs(&["a", "b"]));
        rr.update(&[]);
        assert_eq!(rr.next(), Err(BalancerError::NoHealthyBackends));

        rr.update(&addrs(&["c"]));
        assert_eq!(rr.next().unwrap(), "c");
        assert_eq!(rr.next().unwrap(), "c");
    }

    /// Over k consecutive calls each backend is picked ⌊k/n⌋ or ⌈k/n⌉ times.
    #[test]
    fn rotation_is_fair() {
        let backends = addrs(&["a", "b", "c"]);

        for k in [1usize, 3, 7, 100] {
            let rr = RoundRobin::new(&backends);
            let mut counts: HashMap<String, usize> = HashMap::new();
            for _ in 0..k {
                *counts.entry(rr.next().unwrap()).or_default() += 1;
            }
            for backend in &backends {
                let got = counts.get(backend).copied().unwrap_or(0);
                let floor = k / backends.len();
                let ceil = k.div_ceil(backends.len());
                assert!(
                    got == floor || got == ceil,
                    "k={k} backend={backend} got={got}"
                );
            }
        }
    }

    #[test]
    fn concurrent_next_and_update() {
        let rr = Arc::new(RoundRobin::new(&addrs(&["a", "b", "c"])));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let rr = Arc::clone(&rr);
                thread::spawn(move || {
                    let _ = rr.next();
                    rr.update(&addrs(&["a", "b"]));
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }
}
