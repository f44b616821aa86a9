//! Coordinator configuration
//!
//! Immutable once the coordinator is built. Metrics support is optional:
//! `metrics: None` turns the metrics fetch into a no-op.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_METRICS_PORT: u16 = 4000;

/// Where the Prometheus endpoint lives (same host as the API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsEndpoint {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub refresh_interval: Duration,
    pub metrics: Option<MetricsEndpoint>,
}

impl CoordinatorConfig {
    /// Config with default port, interval and timeout, metrics disabled.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            metrics: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics = Some(MetricsEndpoint { port });
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("refresh interval"));
        }
        Ok(())
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}/api", self.host, self.port)
    }

    pub fn metrics_url(&self) -> Option<String> {
        self.metrics
            .map(|endpoint| format!("http://{}:{}/metrics", self.host, endpoint.port))
    }

    /// Stable identifier of this Blocky instance, `host:port`.
    pub fn entry_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_urls() {
        let config = CoordinatorConfig::new("10.0.0.2");
        assert_eq!(config.port, 4000);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert!(!config.metrics_enabled());
        assert_eq!(config.base_url(), "http://10.0.0.2:4000/api");
        assert_eq!(config.metrics_url(), None);

        let config = config.with_port(4001).with_metrics_port(9110);
        assert_eq!(config.metrics_url().as_deref(), Some("http://10.0.0.2:9110/metrics"));
        assert_eq!(config.entry_id(), "10.0.0.2:4001");
    }

    #[test]
    fn test_validation() {
        assert_eq!(CoordinatorConfig::new(" ").validate(), Err(ConfigError::EmptyHost));
        assert_eq!(
            CoordinatorConfig::new("dns").with_timeout(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration("timeout"))
        );
        assert!(CoordinatorConfig::new("dns").validate().is_ok());
    }
}
