//! Periodic backend prober.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Invoked with the sorted live set at the end of every probe round.
pub type LiveSetCallback = Arc<dyn Fn(Vec<String>) + Send + Sync>;

struct Params {
    backends: Vec<String>,
    interval: Duration,
    timeout: Duration,
    path: String,
}

struct CheckLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    params: Params,
    active: Option<CheckLoop>,
}

/// Periodically probes the configured backends and reports the live set.
///
/// At most one probe loop runs at a time. The loop works against a
/// snapshot of the parameters taken at `start`; changing them afterwards
/// requires `stop` (drain) followed by `start` (relaunch).
pub struct HealthChecker {
    inner: Mutex<Inner>,
    on_update: LiveSetCallback,
}

impl HealthChecker {
    pub fn new(
        backends: Vec<String>,
        interval: Duration,
        timeout: Duration,
        path: impl Into<String>,
        on_update: LiveSetCallback,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                params: Params {
                    backends,
                    interval,
                    timeout,
                    path: path.into(),
                },
                active: None,
            }),
            on_update,
        }
    }

    /// Launch the probe loop with a cancellation token derived from
    /// `parent`. Idempotent: a second call while a loop is active (or
    /// signalled but not yet drained) is ignored.
    pub fn start(&self, parent: &CancellationToken) {
        let mut inner = self.inner.lock().expect("health checker lock poisoned");

        if inner.active.is_some() {
            tracing::info!("start called but a check loop is already running, ignoring");
            return;
        }

        let cancel = parent.child_token();
        let backends = inner.params.backends.clone();
        let interval = inner.params.interval;
        let timeout = inner.params.timeout;
        let path = inner.params.path.clone();
        let on_update = Arc::clone(&self.on_update);

        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_loop(backends, interval, timeout, path, on_update, loop_cancel).await;
        });

        inner.active = Some(CheckLoop { cancel, handle });
    }

    /// Cancel the active loop and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        let active = {
            let mut inner = self.inner.lock().expect("health checker lock poisoned");
            inner.active.take()
        };

        match active {
            Some(active) => {
                tracing::info!("stopping health check loop");
                active.cancel.cancel();
                let _ = active.handle.await;
                tracing::info!("health check loop stopped");
            }
            None => tracing::info!("stop called but no active check loop"),
        }
    }

    /// Replace the stored parameters and signal the running loop to wind
    /// down, without waiting for it. Callers that need the new parameters
    /// in force must `stop().await` and then `start` again.
    pub fn update_config(
        &self,
        backends: Vec<String>,
        interval: Duration,
        timeout: Duration,
        path: impl Into<String>,
    ) {
        let mut inner = self.inner.lock().expect("health checker lock poisoned");
        let path = path.into();

        tracing::info!(
            backends = ?backends,
            ?interval,
            ?timeout,
            path = %path,
            "health checker received config update"
        );

        if let Some(active) = &inner.active {
            active.cancel.cancel();
        }

        inner.params = Params {
            backends,
            interval,
            timeout,
            path,
        };
    }
}

async fn run_loop(
    backends: Vec<String>,
    interval: Duration,
    timeout: Duration,
    path: String,
    on_update: LiveSetCallback,
    cancel: CancellationToken,
) {
    tracing::info!(
        ?interval,
        path = %path,
        backends = ?backends,
        "health check loop started"
    );

    // One-shot connections: a backend that went away must not leave a
    // poisoned pooled socket behind.
    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to build probe client");
            return;
        }
    };

    loop {
        perform_round(&client, &backends, &path, &on_update, &cancel).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("health check loop stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// One probe round: every backend once, in parallel. No state carries
/// over between rounds.
async fn perform_round(
    client: &reqwest::Client,
    backends: &[String],
    path: &str,
    on_update: &LiveSetCallback,
    cancel: &CancellationToken,
) {
    if backends.is_empty() {
        tracing::debug!("no backends to check in this round");
        on_update(Vec::new());
        return;
    }

    let probes = backends.iter().map(|addr| probe(client, addr, path, cancel));
    let results = futures::future::join_all(probes).await;

    let mut live: Vec<String> = backends
        .iter()
        .zip(results)
        .filter(|(_, ok)| *ok)
        .map(|(addr, _)| addr.clone())
        .collect();
    live.sort();

    tracing::info!(
        live = ?live,
        total_checked = backends.len(),
        "health check round completed"
    );
    on_update(live);
}

async fn probe(
    client: &reqwest::Client,
    addr: &str,
    path: &str,
    cancel: &CancellationToken,
) -> bool {
    let url = probe_url(addr, path);

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(backend = %addr, url = %url, "probe cancelled");
            false
        }
        result = client.get(&url).send() => match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!(
                    backend = %addr,
                    url = %url,
                    status = %response.status(),
                    "backend unhealthy"
                );
                false
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    tracing::debug!(backend = %addr, url = %url, "probe cancelled");
                } else {
                    tracing::warn!(backend = %addr, url = %url, error = %err, "probe failed");
                }
                false
            }
        }
    }
}

/// `scheme://host[:port]/path`, assuming http when the backend address
/// carries no scheme and collapsing duplicate slashes at the join.
fn probe_url(addr: &str, path: &str) -> String {
    let mut url = addr.trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{url}");
    }

    let path = path.trim_start_matches('/');
    if !path.is_empty() {
        url = format!("{url}/{path}");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_url_adds_scheme_and_joins_path() {
        assert_eq!(probe_url("127.0.0.1:9000", "/health"), "http://127.0.0.1:9000/health");
        assert_eq!(probe_url("http://a.example/", "health"), "http://a.example/health");
        assert_eq!(probe_url("https://b.example", "/status"), "https://b.example/status");
    }

    #[test]
    fn probe_url_with_empty_path() {
        assert_eq!(probe_url("127.0.0.1:9000/", ""), "http://127.0.0.1:9000");
        assert_eq!(probe_url("c.example", "/"), "http://c.example");
    }
}
