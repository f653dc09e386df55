//! Configuration schema.
//!
//! All types derive Serde traits for deserialization from the rendered
//! YAML. Durations accept the human-friendly `5s` / `10s` form. Fields
//! left at zero/empty receive the documented defaults at load time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,

    /// Balancing strategy name: `round-robin` or `random`.
    pub strategy: String,

    /// Backend URLs (scheme optional; http assumed).
    pub backends: Vec<String>,

    pub health_check: HealthCheckConfig,

    pub rate_limiter: RateLimiterConfig,

    /// Log destination; empty means stdout.
    pub log_file: String,

    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: String,

    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    #[serde(rename = "interval_seconds", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(rename = "timeout_seconds", with = "humantime_serde")]
    pub timeout: Duration,

    /// Probe path, e.g. `/health`.
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enabled: bool,

    pub default_capacity: u64,

    #[serde(rename = "default_rate_per_second")]
    pub default_rate: u64,

    pub client_overrides: Vec<ClientOverride>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientOverride {
    pub client_id: String,

    pub capacity: u64,

    #[serde(rename = "rate_per_second")]
    pub rate: u64,
}

/// Fill every zero/empty field with its documented default.
pub fn apply_defaults(config: &mut Config) {
    if config.server.port.is_empty() {
        config.server.port = "8080".to_string();
    }
    if config.server.read_timeout.is_zero() {
        config.server.read_timeout = Duration::from_secs(5);
    }
    if config.server.write_timeout.is_zero() {
        config.server.write_timeout = Duration::from_secs(10);
    }

    if config.health_check.interval.is_zero() {
        config.health_check.interval = Duration::from_secs(10);
    }
    if config.health_check.timeout.is_zero() {
        config.health_check.timeout = Duration::from_secs(5);
    }
    if config.health_check.path.is_empty() {
        config.health_check.path = "/health".to_string();
    }

    if config.strategy.is_empty() {
        config.strategy = "round-robin".to_string();
    }

    if config.rate_limiter.default_rate == 0 {
        config.rate_limiter.default_rate = 10;
    }
    if config.rate_limiter.default_capacity == 0 {
        config.rate_limiter.default_capacity = 100;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_an_empty_config() {
        let mut config = Config::default();
        apply_defaults(&mut config);

        assert_eq!(config.server.port, "8080");
        assert_eq!(config.server.read_timeout, Duration::from_secs(5));
        assert_eq!(config.server.write_timeout, Duration::from_secs(10));
        assert_eq!(config.health_check.interval, Duration::from_secs(10));
        assert_eq!(config.health_check.timeout, Duration::from_secs(5));
        assert_eq!(config.health_check.path, "/health");
        assert_eq!(config.strategy, "round-robin");
        assert_eq!(config.rate_limiter.default_rate, 10);
        assert_eq!(config.rate_limiter.default_capacity, 100);
    }

    #[test]
    fn defaults_do_not_clobber_set_fields() {
        let mut config = Config::default();
        config.server.port = "9999".to_string();
        config.strategy = "random".to_string();
        config.rate_limiter.default_capacity = 7;
        apply_defaults(&mut config);

        assert_eq!(config.server.port, "9999");
        assert_eq!(config.strategy, "random");
        assert_eq!(config.rate_limiter.default_capacity, 7);
    }

    #[test]
    fn parses_the_yaml_surface() {
        let yaml = r#"
server:
  port: "8080"
  read_timeout: 5s
  write_timeout: 10s
strategy: round-robin
backends:
  - "127.0.0.1:9001"
  - "http://127.0.0.1:9002"
health_check:
  interval_seconds: 10s
  timeout_seconds: 5s
  path: /health
rate_limiter:
  enabled: true
  default_capacity: 100
  default_rate_per_second: 10
  client_overrides:
    - client_id: superuser
      capacity: 10
      rate_per_second: 1
log_level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.health_check.interval, Duration::from_secs(10));
        assert!(config.rate_limiter.enabled);
        assert_eq!(config.rate_limiter.client_overrides[0].client_id, "superuser");
        assert_eq!(config.rate_limiter.client_overrides[0].capacity, 10);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_file, "");
    }

    #[test]
    fn missing_sections_deserialize_to_zero_values() {
        let config: Config = serde_yaml::from_str("strategy: random\n").unwrap();
        assert_eq!(config.strategy, "random");
        assert!(config.backends.is_empty());
        assert!(config.server.read_timeout.is_zero());
        assert!(!config.rate_limiter.enabled);
    }
}
