//! Uniform random backend selection.

use std::sync::RwLock;

use rand::Rng;

use crate::balancer::{BalancerError, Strategy};

pub struct Random {
    backends: RwLock<Vec<String>>,
}

impl Random {
    pub fn new(backends: &[String]) -> Self {
        Self {
            backends: RwLock::new(backends.to_vec()),
        }
    }
}

impl Strategy for Random {
    fn next(&self) -> Result<String, BalancerError> {
        let backends = self.backends.read().expect("random strategy lock poisoned");
        if backends.is_empty() {
            return Err(BalancerError::NoHealthyBackends);
        }

        let idx = rand::thread_rng().gen_range(0..backends.len());
        Ok(backends[idx].clone())
    }

    fn update(&self, backends: &[String]) {
        let mut current = self.backends.write().expect("random strategy lock poisoned");
        *current = backends.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_is_an_error() {
        let random = Random::new(&[]);
        assert_eq!(random.next(), Err(BalancerError::NoHealthyBackends));
    }

    #[test]
    fn only_returns_members_of_the_list() {
        let backends = addrs(&["a", "b", "c"]);
        let random = Random::new(&backends);
        for _ in 0..200 {
            assert!(backends.contains(&random.next().unwrap()));
        }
    }

    /// Every element is eventually selected.
    #[test]
    fn covers_all_backends() {
        let backends = addrs(&["a", "b", "c", "d"]);
        let random = Random::new(&backends);

        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            seen.insert(random.next().unwrap());
            if seen.len() == backends.len() {
                break;
            }
        }
        assert_eq!(seen.len(), backends.len());
    }

    #[test]
    fn update_replaces_the_pool() {
        let random = Random::new(&addrs(&["a"]));
        random.update(&addrs(&["x", "y"]));
        for _ in 0..50 {
            let picked = random.next().unwrap();
            assert!(picked == "x" || picked == "y");
        }
    }
}
