//! Registry of per-client token buckets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::rate_limit::Bucket;

/// Per-client bucket parameters that supersede the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLimit {
    pub capacity: u64,
    pub rate: u64,
}

struct Registry {
    buckets: HashMap<String, Arc<Mutex<Bucket>>>,
    last_seen: HashMap<String, Instant>,
    overrides: HashMap<String, ClientLimit>,
    default_capacity: u64,
    default_rate: u64,
}

struct CleanupLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Per-client admission control.
///
/// Buckets are created lazily on a client's first request, using the
/// override for that client if one exists and the defaults otherwise, and
/// keep those parameters until the cleanup loop evicts them.
pub struct Limiter {
    registry: Arc<RwLock<Registry>>,
    cleanup: Mutex<Option<CleanupLoop>>,
}

impl Limiter {
    pub fn new(
        default_capacity: u64,
        default_rate: u64,
        overrides: HashMap<String, ClientLimit>,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                buckets: HashMap::new(),
                last_seen: HashMap::new(),
                overrides,
                default_capacity,
                default_rate,
            })),
            cleanup: Mutex::new(None),
        }
    }

    /// Admit or deny one request from `client_id`.
    pub fn allow(&self, client_id: &str) -> bool {
        let bucket = self.bucket_for(client_id);
        let mut bucket = bucket.lock().expect("bucket mutex poisoned");
        bucket.allow()
    }

    fn bucket_for(&self, client_id: &str) -> Arc<Mutex<Bucket>> {
        {
            let registry = self.registry.read().expect("limiter lock poisoned");
            if let Some(bucket) = registry.buckets.get(client_id) {
                let bucket = Arc::clone(bucket);
                drop(registry);
                let mut registry = self.registry.write().expect("limiter lock poisoned");
                registry.last_seen.insert(client_id.to_string(), Instant::now());
                return bucket;
            }
        }

        let mut registry = self.registry.write().expect("limiter lock poisoned");

        // Double-checked: another caller may have created the bucket while
        // we were waiting for the write lock.
        if let Some(bucket) = registry.buckets.get(client_id) {
            let bucket = Arc::clone(bucket);
            registry.last_seen.insert(client_id.to_string(), Instant::now());
            return bucket;
        }

        let limit = registry.overrides.get(client_id).cloned().unwrap_or(ClientLimit {
            capacity: registry.default_capacity,
            rate: registry.default_rate,
        });

        let bucket = Arc::new(Mutex::new(Bucket::new(limit.capacity, limit.rate)));
        registry
            .buckets
            .insert(client_id.to_string(), Arc::clone(&bucket));
        registry.last_seen.insert(client_id.to_string(), Instant::now());

        tracing::debug!(
            client_id = %client_id,
            capacity = limit.capacity,
            rate = limit.rate,
            "created new bucket"
        );
        bucket
    }

    /// Replace the defaults and the override table. Existing buckets keep
    /// their parameters; they adopt the new configuration only after
    /// eviction and lazy recreation.
    pub fn update_config(
        &self,
        default_capacity: u64,
        default_rate: u64,
        overrides: HashMap<String, ClientLimit>,
    ) {
        let mut registry = self.registry.write().expect("limiter lock poisoned");
        tracing::info!(
            default_capacity,
            default_rate,
            overrides = overrides.len(),
            "rate limiter configuration updated"
        );
        registry.default_capacity = default_capacity;
        registry.default_rate = default_rate;
        registry.overrides = overrides;
    }

    /// Launch the background eviction loop. A second call while a loop is
    /// active is ignored.
    pub fn start_cleanup(&self, parent: &CancellationToken, interval: Duration, ttl: Duration) {
        let mut cleanup = self.cleanup.lock().expect("cleanup mutex poisoned");
        if cleanup.is_some() {
            tracing::info!("cleanup loop already running, ignoring start");
            return;
        }

        let cancel = parent.child_token();
        let registry = Arc::clone(&self.registry);
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(?interval, ?ttl, "cleanup loop started");
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => {
                        tracing::info!("cleanup loop stopping");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let evicted = evict_idle(&registry, ttl);
                        if evicted > 0 {
                            tracing::debug!(count = evicted, "evicted idle buckets");
                        }
                    }
                }
            }
        });

        *cleanup = Some(CleanupLoop { cancel, handle });
    }

    /// Stop the eviction loop and wait for it to exit. No-op when idle.
    pub async fn stop_cleanup(&self) {
        let active = {
            let mut cleanup = self.cleanup.lock().expect("cleanup mutex poisoned");
            cleanup.take()
        };

        match active {
            Some(active) => {
                active.cancel.cancel();
                let _ = active.handle.await;
                tracing::info!("cleanup loop stopped");
            }
            None => tracing::info!("no active cleanup loop to stop"),
        }
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.registry
            .read()
            .expect("limiter lock poisoned")
            .buckets
            .len()
    }

    #[cfg(test)]
    fn bucket_params(&self, client_id: &str) -> Option<(u64, u64)> {
        let registry = self.registry.read().expect("limiter lock poisoned");
        registry.buckets.get(client_id).map(|bucket| {
            let bucket = bucket.lock().expect("bucket mutex poisoned");
            (bucket.capacity(), bucket.refill_rate())
        })
    }
}

/// Remove every bucket idle beyond `ttl` that has refilled back to
/// capacity. A partially drained bucket is kept so the client does not
/// regain a full allowance through eviction. Locks registry then bucket,
/// matching the order used on the request path.
fn evict_idle(registry: &RwLock<Registry>, ttl: Duration) -> usize {
    let mut registry = registry.write().expect("limiter lock poisoned");
    let now = Instant::now();

    let expired: Vec<String> = registry
        .buckets
        .iter()
        .filter(|(client_id, bucket)| {
            let idle = registry
                .last_seen
                .get(*client_id)
                .is_some_and(|seen| now.duration_since(*seen) > ttl);
            idle && bucket.lock().expect("bucket mutex poisoned").is_full()
        })
        .map(|(client_id, _)| client_id.clone())
        .collect();

    for client_id in &expired {
        registry.buckets.remove(client_id);
        registry.last_seen.remove(client_id);
    }
    expired.len()
}
