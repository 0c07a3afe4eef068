//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section is optional; a missing file yields the defaults. Secrets (the
//! weather API key) are referenced by env-var name and resolved at runtime.
//!
//! The city set, the daytime hour window and the 5-day summary window are
//! fixed constants and deliberately absent from this file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::PipelineError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub pipeline: PipelineConfig,
    pub report: ReportConfig,
}

/// Which weather source backs the fetch stage.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    File,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub base_url: String,
    /// Directory of `<slug>-response.json` files for `kind = "file"`.
    pub data_dir: String,
    /// Env var holding the API key, if the source requires one.
    pub api_key_env: Option<String>,
    /// Per-fetch timeout. A timed-out fetch is treated as a failed fetch.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            base_url: "https://code.s3.yandex.net/async-module".to_string(),
            data_dir: "data".to_string(),
            api_key_env: None,
            timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker pool size. Defaults to the available parallelism.
    pub workers: Option<usize>,
    /// Buffer size of the export channel.
    pub channel_capacity: usize,
    /// Divide summaries by the number of days present instead of by 5.
    /// Off by default: the reference behaviour always divides by 5.
    pub divide_by_available_days: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            channel_capacity: 16,
            divide_by_available_days: false,
        }
    }
}

impl PipelineConfig {
    /// Effective worker count, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    pub path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: "data.csv".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.source.timeout_secs == 0 {
            return Err(PipelineError::Config("source.timeout_secs must be > 0".into()).into());
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(
                PipelineError::Config("pipeline.channel_capacity must be > 0".into()).into(),
            );
        }
        if self.pipeline.workers == Some(0) {
            return Err(PipelineError::Config("pipeline.workers must be > 0".into()).into());
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
