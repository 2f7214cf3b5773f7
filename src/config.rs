use crate::constants::{
    API_KEY_ENV, API_KEY_ENV_FALLBACK, DEFAULT_ARTIFACT_PATH, DEFAULT_BASE_URL,
    DEFAULT_CONCURRENCY, DEFAULT_LOG_DIR, DEFAULT_PARCL_IDS, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
use crate::error::{PipelineError, Result};
use crate::types::ParclId;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when one market's history cannot be fetched or normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole pipeline on the first failure
    #[default]
    Abort,
    /// Drop the failing market and keep going
    Skip,
}

/// What to do with selected ids the provider catalog doesn't list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    #[default]
    Drop,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub unmatched_policy: UnmatchedPolicy,
    pub retry: RetryPolicy,
    pub selection: Vec<ParclId>,
    pub output_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_dir: PathBuf,
    pub metrics_addr: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
            unmatched_policy: UnmatchedPolicy::default(),
            retry: RetryPolicy::default(),
            selection: DEFAULT_PARCL_IDS.to_vec(),
            output_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            metrics_addr: None,
        }
    }
}

impl Config {
    /// Load settings from a TOML file. A missing file yields the defaults;
    /// an unreadable or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout_secs must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.selection.is_empty() {
            return Err(PipelineError::Config("selection must list at least one market".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Read the API key from the process environment.
pub fn api_key_from_env() -> Result<String> {
    api_key_from(|name| std::env::var(name).ok())
}

/// Look the key up under `API_KEY_ENV`, then under the lowercase spelling.
/// A blank value counts as unset.
pub fn api_key_from<F>(lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = [API_KEY_ENV, API_KEY_ENV_FALLBACK]
        .into_iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()));
    resolve_api_key(value)
}

/// A missing or blank key is fatal before any request is made.
pub fn resolve_api_key(value: Option<String>) -> Result<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(PipelineError::Config(format!(
            "{API_KEY_ENV} is not set; export it or add it to .env"
        ))),
    }
}
