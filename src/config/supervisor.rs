//! Config lifecycle: load, watch, debounce, publish.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use rand::Rng;
use tokio::sync::mpsc;

use crate::config::schema::{self, Config};
use crate::config::{template, ConfigError};

const DEFAULT_TEMPLATE_PATH: &str = "configs/config.template.yaml";
const DEFAULT_OUTPUT_PATH: &str = "configs/config.yaml";
const DEFAULT_ENV_PATH: &str = ".env";

/// Editor save storms within this window collapse into one reload.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Callback invoked with the new config after each successful reload.
pub type ConfigCallback =
    Arc<dyn Fn(Arc<Config>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Inner {
    current: Arc<Config>,
    subscribers: Vec<ConfigCallback>,
}

/// Owns the current configuration and the file watcher that keeps it
/// fresh. One instance per process, shared by reference.
pub struct Supervisor {
    template_path: PathBuf,
    env_path: PathBuf,
    output_path: PathBuf,
    inner: RwLock<Inner>,
}

impl Supervisor {
    /// Resolve the output path (CONFIG_PATH env var, then the optional
    /// argument, then the default), render and load the config, and spawn
    /// the watcher. Must run inside a tokio runtime.
    pub fn init(path: Option<&str>) -> Result<Arc<Self>, ConfigError> {
        let output = std::env::var("CONFIG_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| path.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());

        Self::init_at(
            Path::new(DEFAULT_TEMPLATE_PATH),
            Path::new(DEFAULT_ENV_PATH),
            Path::new(&output),
        )
    }

    /// Like [`Supervisor::init`] with every path explicit.
    pub fn init_at(
        template_path: &Path,
        env_path: &Path,
        output_path: &Path,
    ) -> Result<Arc<Self>, ConfigError> {
        // A missing .env is fine; the environment may carry everything.
        let _ = dotenvy::from_path(env_path);

        template::render(template_path, output_path)?;
        let config = load(output_path)?;

        let supervisor = Arc::new(Self {
            template_path: template_path.to_path_buf(),
            env_path: env_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            inner: RwLock::new(Inner {
                current: Arc::new(config),
                subscribers: Vec::new(),
            }),
        });

        tokio::spawn(watch(Arc::clone(&supervisor)));
        Ok(supervisor)
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Arc<Config> {
        Arc::clone(&self.inner.read().expect("config lock poisoned").current)
    }

    /// Register a callback for future reloads. Subscribers are never
    /// removed; each dispatch runs on its own task.
    pub fn subscribe<F, Fut>(&self, callback: F)
    where
        F: Fn(Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: ConfigCallback = Arc::new(move |config| Box::pin(callback(config)));
        self.inner
            .write()
            .expect("config lock poisoned")
            .subscribers
            .push(callback);
    }

    /// Re-render and reload. On failure the previous config stays in
    /// force and subscribers are not notified.
    fn reload(&self) {
        // Pick up edits to .env itself, not just the template.
        let _ = dotenvy::from_path_override(&self.env_path);

        if let Err(err) = template::render(&self.template_path, &self.output_path) {
            tracing::error!(error = %err, "failed to render config from template");
            return;
        }

        let config = match load(&self.output_path) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                tracing::error!(error = %err, "failed to reload config");
                return;
            }
        };

        let subscribers = {
            let mut inner = self.inner.write().expect("config lock poisoned");
            inner.current = Arc::clone(&config);
            inner.subscribers.clone()
        };

        for subscriber in subscribers {
            let config = Arc::clone(&config);
            tokio::spawn(subscriber(config));
        }
        tracing::info!("config reloaded");
    }
}

/// Parse the rendered YAML and apply defaults for zero/empty fields.
fn load(path: &Path) -> Result<Config, ConfigError> {
    let data = fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&data)?;
    schema::apply_defaults(&mut config);
    Ok(config)
}

/// Watch loop wrapper: a failed watcher backend is reopened with
/// exponential backoff instead of ending hot reload for the process.
async fn watch(supervisor: Arc<Supervisor>) {
    let mut attempt: u32 = 0;
    loop {
        match watch_once(&supervisor).await {
            Ok(()) => return,
            Err(err) => {
                attempt += 1;
                let delay = reconnect_backoff(attempt);
                tracing::error!(error = %err, ?delay, "config watcher failed, reopening");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn watch_once(supervisor: &Supervisor) -> Result<(), notify::Error> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
        let _ = tx.send(result);
    })?;

    watcher.watch(&supervisor.template_path, RecursiveMode::NonRecursive)?;
    if let Err(err) = watcher.watch(&supervisor.env_path, RecursiveMode::NonRecursive) {
        tracing::warn!(error = %err, "failed to watch .env");
    }

    tracing::info!(
        template = %supervisor.template_path.display(),
        "config watcher started"
    );

    let debounce = tokio::time::sleep(DEBOUNCE_WINDOW);
    tokio::pin!(debounce);
    let mut armed = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                None => return Ok(()),
                Some(Ok(event)) if matches!(event.kind, EventKind::Modify(_)) => {
                    debounce
                        .as_mut()
                        .reset(tokio::time::Instant::now() + DEBOUNCE_WINDOW);
                    armed = true;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err),
            },
            _ = &mut debounce, if armed => {
                armed = false;
                supervisor.reload();
            }
        }
    }
}

fn reconnect_backoff(attempt: u32) -> Duration {
    let exponential = 2u64.saturating_pow(attempt.saturating_sub(1));
    let delay_ms = 500u64.saturating_mul(exponential).min(30_000);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}
