//! YAML configuration
//!
//! ```yaml
//! storage:
//!   endpoint: http://localhost:9000
//!   path_style: true
//! pipeline:
//!   queue_depth: 10
//! jobs:
//!   - from:
//!       url: https://mirror.example/centos/7/os/x86_64/
//!       type: yum
//!     to:
//!       container: centos
//!       object_prefix: 7/os/x86_64/
//! ```

use crate::error::{BootstrapError, ConfigError};
use crate::storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Tuning of the transfer pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of each queue between stages
    pub queue_depth: usize,
    /// Extra attempts for a failed transfer within one run
    pub transfer_retries: u32,
    /// Per-request timeout of source HTTP clients
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 10,
            transfer_retries: 0,
            request_timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTML directory listings
    #[default]
    Url,
    /// Yum repository metadata
    Yum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    /// PEM client certificate
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// PEM private key for `cert`
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// PEM CA bundle to validate the server against
    #[serde(default)]
    pub ca: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub object_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub from: SourceConfig,
    pub to: TargetConfig,
    #[serde(default)]
    pub except: Option<String>,
    #[serde(default)]
    pub only: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let text = std::fs::read_to_string(path).map_err(|source| BootstrapError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text, &path.display().to_string())
    }

    /// Parse configuration text; `origin` names it in errors
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, BootstrapError> {
        serde_yaml::from_str(text).map_err(|source| BootstrapError::ParseConfig {
            path: origin.to_string(),
            source,
        })
    }

    /// Checks of everything outside the individual jobs
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.pipeline.queue_depth == 0 {
            errors.push(ConfigError::new("pipeline", "queue_depth", "must be at least 1"));
        }
        if self.jobs.is_empty() {
            errors.push(ConfigError::new("jobs", "jobs", "no jobs are configured"));
        }
        errors
    }
}
