//! HTTP reverse-proxy load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                 LOAD BALANCER                     │
//!                 │                                                   │
//!  Client ────────┼─▶ rate-limit ──▶ balancer ──▶ proxy ─────────────┼──▶ Backend
//!                 │   middleware      (strategy)    forward           │
//!                 │                       ▲                           │
//!                 │                       │ live set                  │
//!                 │                 health checker (periodic probes)  │
//!                 │                       ▲                           │
//!                 │                       │ reconfigure               │
//!                 │   config supervisor (template + .env watcher) ────┼──▶ limiter,
//!                 │                                                   │    strategy
//!                 └──────────────────────────────────────────────────┘
//! ```
//!
//! The config supervisor publishes every reload to its subscribers: the
//! balancer swaps strategies when the name changes, the rate limiter
//! adopts new defaults/overrides, and the health checker is stopped,
//! reconfigured and restarted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use load_balancer::balancer::{factory, AtomicBalancer};
use load_balancer::config::{Config, Supervisor};
use load_balancer::health::{HealthChecker, LiveSetCallback};
use load_balancer::http::HttpServer;
use load_balancer::observability;
use load_balancer::rate_limit::{ClientLimit, Limiter};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3 * 60);
const CLEANUP_TTL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let supervisor = Supervisor::init(config_path.as_deref())?;
    let config = supervisor.get();

    observability::logging::init(&config.log_level, &config.log_file);
    tracing::info!("configuration loaded");
    tracing::info!(level = %config.log_level, "logger initialized");

    // Parent token for every background loop.
    let shutdown = CancellationToken::new();

    let balancer = setup_balancer(&supervisor, &config);
    let limiter = setup_rate_limiter(&supervisor, &config, &shutdown);
    let checker = setup_health_checker(&supervisor, &config, &shutdown, Arc::clone(&balancer));

    let admission = config.rate_limiter.enabled.then(|| Arc::clone(&limiter));
    let server = HttpServer::new(Arc::clone(&balancer), admission, &config.server);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;

    let server_shutdown = shutdown.clone();
    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
            shutdown.cancel();
        })
    };

    server.run(listener, server_shutdown).await?;

    // Drain the background loops before exiting.
    shutdown.cancel();
    checker.stop().await;
    limiter.stop_cleanup().await;
    ctrl_c.abort();

    tracing::info!("all components stopped, exiting");
    Ok(())
}

fn setup_balancer(supervisor: &Supervisor, config: &Config) -> Arc<AtomicBalancer> {
    let balancer = Arc::new(AtomicBalancer::new(factory::create(
        &config.strategy,
        &config.backends,
    )));
    tracing::info!(strategy = %config.strategy, "balancer initialized");

    // Swap the strategy only when its name changes; backend churn is the
    // health checker's job.
    let active_strategy = Arc::new(Mutex::new(config.strategy.clone()));
    let subscriber_balancer = Arc::clone(&balancer);
    supervisor.subscribe(move |new_config: Arc<Config>| {
        let balancer = Arc::clone(&subscriber_balancer);
        let active_strategy = Arc::clone(&active_strategy);
        async move {
            let mut active = active_strategy.lock().expect("strategy name lock poisoned");
            if *active != new_config.strategy {
                balancer.set_strategy(factory::create(
                    &new_config.strategy,
                    &new_config.backends,
                ));
                tracing::info!(strategy = %new_config.strategy, "balancer strategy replaced");
                *active = new_config.strategy.clone();
            }
        }
    });

    balancer
}

fn setup_rate_limiter(
    supervisor: &Supervisor,
    config: &Config,
    shutdown: &CancellationToken,
) -> Arc<Limiter> {
    let limiter = Arc::new(Limiter::new(
        config.rate_limiter.default_capacity,
        config.rate_limiter.default_rate,
        override_map(config),
    ));
    limiter.start_cleanup(shutdown, CLEANUP_INTERVAL, CLEANUP_TTL);

    let subscriber_limiter = Arc::clone(&limiter);
    supervisor.subscribe(move |new_config: Arc<Config>| {
        let limiter = Arc::clone(&subscriber_limiter);
        async move {
            limiter.update_config(
                new_config.rate_limiter.default_capacity,
                new_config.rate_limiter.default_rate,
                override_map(&new_config),
            );
        }
    });

    tracing::info!("rate limiter initialized, cleanup loop started");
    limiter
}

fn setup_health_checker(
    supervisor: &Supervisor,
    config: &Config,
    shutdown: &CancellationToken,
    balancer: Arc<AtomicBalancer>,
) -> Arc<HealthChecker> {
    let on_update: LiveSetCallback = Arc::new(move |live: Vec<String>| {
        balancer.update(&live);
    });

    let checker = Arc::new(HealthChecker::new(
        config.backends.clone(),
        config.health_check.interval,
        config.health_check.timeout,
        config.health_check.path.clone(),
        on_update,
    ));
    checker.start(shutdown);

    let subscriber_checker = Arc::clone(&checker);
    let parent = shutdown.clone();
    supervisor.subscribe(move |new_config: Arc<Config>| {
        let checker = Arc::clone(&subscriber_checker);
        let parent = parent.clone();
        async move {
            tracing::info!("stopping health checker for reconfiguration");
            checker.stop().await;
            checker.update_config(
                new_config.backends.clone(),
                new_config.health_check.interval,
                new_config.health_check.timeout,
                new_config.health_check.path.clone(),
            );
            checker.start(&parent);
            tracing::info!("health checker restarted with new configuration");
        }
    });

    tracing::info!("health checker started");
    checker
}

fn override_map(config: &Config) -> HashMap<String, ClientLimit> {
    config
        .rate_limiter
        .client_overrides
        .iter()
        .map(|client| {
            (
                client.client_id.clone(),
                ClientLimit {
                    capacity: client.capacity,
                    rate: client.rate,
                },
            )
        })
        .collect()
}
