use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like user agent; some CDNs reject requests from unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Global configuration loaded from `~/.config/mdl/config.toml`.
///
/// Every value is a default; command-line flags override them per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdlConfig {
    /// Number of parallel download workers.
    pub workers: usize,
    /// Aggregate bandwidth cap in KiB/s across all workers (0 = unlimited).
    pub limit_kib: u64,
    /// Directory downloads are written to (created if absent).
    pub output_dir: PathBuf,
    /// Timeout for each HEAD request of the size probe.
    pub probe_timeout_secs: u64,
    /// Progress redraw interval in milliseconds.
    pub render_interval_ms: u64,
    /// User-Agent header sent with HEAD and GET requests.
    pub user_agent: String,
}

impl Default for MdlConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            limit_kib: 0,
            output_dir: PathBuf::from("."),
            probe_timeout_secs: 10,
            render_interval_ms: 180,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl MdlConfig {
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize config")
    }
}

/// Invalid engine configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1 (got {0})")]
    InvalidWorkerCount(usize),
}

/// Validated configuration passed into the worker pool and batch runner.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_count: usize,
    /// Throughput ceiling shared by all workers; 0 = unlimited.
    pub bandwidth_cap_bytes_per_sec: u64,
    pub output_dir: PathBuf,
    pub probe_timeout: Duration,
    pub render_interval: Duration,
    pub user_agent: String,
}

impl EngineConfig {
    /// Builds an engine config from file defaults. Call `validate` before use.
    pub fn from_config(cfg: &MdlConfig) -> Self {
        Self {
            worker_count: cfg.workers,
            bandwidth_cap_bytes_per_sec: cfg.limit_kib.saturating_mul(1024),
            output_dir: cfg.output_dir.clone(),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs.max(1)),
            render_interval: Duration::from_millis(cfg.render_interval_ms.max(10)),
            user_agent: cfg.user_agent.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.worker_count));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&MdlConfig::default())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdlConfig::default();
        let toml = default_cfg.to_toml_string()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)
            .with_context(|| format!("write default config {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: MdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
