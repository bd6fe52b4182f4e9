//! Configuration loader and validator for the catalog→Storyblok sync engine.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub storyblok: Storyblok,
    pub sync: Sync,
    pub catalog: Catalog,
}

/// Storyblok management-API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storyblok {
    pub token: String,
    pub space_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Documented management-API limit; calls are spaced 1000ms / rate apart.
    #[serde(default = "default_rate_per_second")]
    pub rate_per_second: u32,
    #[serde(default = "default_init_timeout_seconds")]
    pub init_timeout_seconds: u64,
}

/// Sync policy: retry bounds, backoff shape, event-queue capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sync {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Commerce catalog snapshot used by the CLI in place of a live platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub file: String,
}

fn default_base_url() -> String {
    "https://mapi.storyblok.com/v1/".to_string()
}

fn default_rate_per_second() -> u32 {
    5
}

fn default_init_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    64
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.storyblok.token.trim().is_empty() {
        return Err(ConfigError::Invalid("storyblok.token must be non-empty"));
    }
    if cfg.storyblok.space_id.trim().is_empty() {
        return Err(ConfigError::Invalid("storyblok.space_id must be non-empty"));
    }
    if cfg.storyblok.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("storyblok.base_url must be non-empty"));
    }
    if cfg.storyblok.rate_per_second == 0 {
        return Err(ConfigError::Invalid(
            "storyblok.rate_per_second must be > 0",
        ));
    }
    if cfg.sync.max_attempts == 0 {
        return Err(ConfigError::Invalid("sync.max_attempts must be > 0"));
    }
    if cfg.sync.backoff_base_ms == 0 {
        return Err(ConfigError::Invalid("sync.backoff_base_ms must be > 0"));
    }
    if cfg.sync.backoff_cap_ms < cfg.sync.backoff_base_ms {
        return Err(ConfigError::Invalid(
            "sync.backoff_cap_ms must be >= sync.backoff_base_ms",
        ));
    }
    if cfg.sync.queue_capacity == 0 {
        return Err(ConfigError::Invalid("sync.queue_capacity must be > 0"));
    }
    if cfg.catalog.file.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.file must be non-empty"));
    }
    Ok(())
}

/// Example YAML document matching the schema above.
pub fn example() -> &'static str {
    r#"storyblok:
  token: "YOUR_STORYBLOK_MANAGEMENT_TOKEN"
  space_id: "123456"
  base_url: "https://mapi.storyblok.com/v1/"
  rate_per_second: 5
  init_timeout_seconds: 30

sync:
  max_attempts: 10
  backoff_base_ms: 1000
  backoff_cap_ms: 10000
  queue_capacity: 64

catalog:
  file: "./catalog.json"
"#
}
