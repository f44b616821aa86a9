//! Agent configuration file
//!
//! Handles:
//! - Connection settings (host, API port, Prometheus endpoint)
//! - Polling options (scan interval, timeout, metrics overrides)
//! - Config file location (CLI flag, `BLOCKY_AGENT_CONFIG`, OS config dir)

use anyhow::{Context, Result};
use blocky_coordinator::config::{
    DEFAULT_METRICS_PORT, DEFAULT_PORT, DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS,
};
use blocky_coordinator::{ConfigError, CoordinatorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const CONFIG_ENV_VAR: &str = "BLOCKY_AGENT_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Values chosen when the instance was first set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Tunables that may change later. Metrics settings here override `[connection]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub metrics_enabled: Option<bool>,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            metrics_enabled: None,
            metrics_port: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: "127.0.0.1".to_string(),
                port: DEFAULT_PORT,
                metrics_enabled: false,
                metrics_port: DEFAULT_METRICS_PORT,
            },
            options: OptionsConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AgentConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Config path precedence: explicit flag, then environment, then the OS config dir.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        Self::config_file_path()
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("blocky-agent");
        path.push("config.toml");
        Ok(path)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.options
            .metrics_enabled
            .unwrap_or(self.connection.metrics_enabled)
    }

    pub fn metrics_port(&self) -> u16 {
        self.options.metrics_port.unwrap_or(self.connection.metrics_port)
    }

    /// Effective coordinator settings, validated.
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        let mut config = CoordinatorConfig::new(self.connection.host.trim())
            .with_port(self.connection.port)
            .with_timeout(Duration::from_secs(self.options.timeout_secs))
            .with_refresh_interval(Duration::from_secs(self.options.scan_interval_secs));
        if self.metrics_enabled() {
            config = config.with_metrics_port(self.metrics_port());
        }
        config.validate()?;
        Ok(config)
    }
}
