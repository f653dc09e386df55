//! Flaky mock backends for manual testing.
//!
//! Binds every backend listed in the rendered config and serves an echo
//! handler plus a `/health` endpoint whose liveness flips pseudo-randomly,
//! so the balancer's health checker has something to react to.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::any, routing::get, Router};
use rand::Rng;
use tokio::net::TcpListener;

use load_balancer::config::Supervisor;
use load_balancer::observability;

const FAILURE_DURATION: Duration = Duration::from_secs(10);
const FAILURE_PROBABILITY: f64 = 0.2;

/// Liveness state machine: healthy servers may fall over on a health
/// probe, downed servers recover after a fixed outage.
struct Flaky {
    alive: bool,
    next_failure: Instant,
    next_recovery: Instant,
    port: u16,
}

impl Flaky {
    fn new(port: u16) -> Self {
        let now = Instant::now();
        Self {
            alive: true,
            next_failure: now,
            next_recovery: now,
            port,
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        if self.alive {
            if now >= self.next_failure && rand::thread_rng().gen_bool(FAILURE_PROBABILITY) {
                self.alive = false;
                self.next_recovery = now + FAILURE_DURATION;
                tracing::warn!(port = self.port, "server state changed to DOWN");
            }
        } else if now >= self.next_recovery {
            self.alive = true;
            let quiet = Duration::from_secs(10 + rand::thread_rng().gen_range(0..20));
            self.next_failure = now + quiet;
            tracing::info!(port = self.port, "server state changed to UP");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let supervisor = Supervisor::init(config_path.as_deref())?;
    let config = supervisor.get();

    observability::logging::init(&config.log_level, "");

    let mut servers = Vec::new();
    for backend in &config.backends {
        let Some(port) = backend_port(backend) else {
            tracing::warn!(backend = %backend, "cannot determine port, skipping");
            continue;
        };

        let state = Arc::new(Mutex::new(Flaky::new(port)));
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler))
            .with_state(state);

        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!(port, "mock backend listening");
        servers.push(tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        }));
    }

    if servers.is_empty() {
        tracing::error!("no backends configured, nothing to serve");
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down mock backends");
    for server in servers {
        server.abort();
    }
    Ok(())
}

async fn health_handler(State(state): State<Arc<Mutex<Flaky>>>) -> StatusCode {
    let mut state = state.lock().expect("mock state lock poisoned");
    state.update();
    if state.alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn echo_handler(State(state): State<Arc<Mutex<Flaky>>>) -> (StatusCode, String) {
    let port = state.lock().expect("mock state lock poisoned").port;

    // Simulate uneven backend latency.
    let delay = Duration::from_millis(100 + rand::thread_rng().gen_range(0..1000));
    tokio::time::sleep(delay).await;

    (StatusCode::OK, format!("response from backend :{port}\n"))
}

fn backend_port(backend: &str) -> Option<u16> {
    let without_scheme = backend
        .split_once("://")
        .map_or(backend, |(_, rest)| rest);
    let authority = without_scheme.split('/').next()?;
    authority.rsplit_once(':')?.1.parse().ok()
}
