//! Connection settings for the S3-compatible destination

use serde::{Deserialize, Serialize};
use std::env;

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3-compatible endpoint; AWS when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    /// Fill unset fields from `S3_ENDPOINT`, `S3_ACCESS_KEY`/`AWS_ACCESS_KEY_ID`
    /// and `S3_SECRET_KEY`/`AWS_SECRET_ACCESS_KEY`
    pub fn with_env_fallback(mut self) -> Self {
        if self.endpoint.is_none() {
            self.endpoint = env::var("S3_ENDPOINT").ok();
        }
        if self.access_key.is_none() {
            self.access_key = env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok();
        }
        if self.secret_key.is_none() {
            self.secret_key = env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok();
        }
        self
    }

    /// Static key pair, when both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
