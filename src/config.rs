//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default so a partial (or empty) file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::types::{MAX_LEGS, MIN_LEGS};

/// Upper bound on `service.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Remote analysis service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout; the line adjustment coordinator uses it too.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Slip size bounds and the free-tier save quota.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LimitsConfig {
    #[serde(default = "default_min_legs")]
    pub min_legs: usize,
    #[serde(default = "default_max_legs")]
    pub max_legs: usize,
    #[serde(default = "default_free_tier_parlays")]
    pub free_tier_parlays: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_legs: default_min_legs(),
            max_legs: default_max_legs(),
            free_tier_parlays: default_free_tier_parlays(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    2
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_min_legs() -> usize {
    MIN_LEGS
}

fn default_max_legs() -> usize {
    MAX_LEGS
}

fn default_free_tier_parlays() -> usize {
    3
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let l = &self.limits;
        if l.min_legs < MIN_LEGS || l.max_legs > MAX_LEGS || l.min_legs > l.max_legs {
            anyhow::bail!(
                "limits.min_legs/max_legs must satisfy {MIN_LEGS} <= min <= max <= {MAX_LEGS} (got {}..{})",
                l.min_legs,
                l.max_legs
            );
        }
        if self.service.timeout_secs == 0 {
            anyhow::bail!("service.timeout_secs must be positive");
        }
        if self.service.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!(
                "service.max_retries must be at most {MAX_RETRIES_LIMIT} (got {})",
                self.service.max_retries
            );
        }
        Ok(())
    }
}
