//! Error types for the importer
//!
//! The taxonomy follows how far a failure reaches:
//!
//! - [`BootstrapError`] aborts the process before any pipeline starts.
//! - [`ListEntriesError`] ends enumeration for one job only.
//! - [`SourceError`] and [`StorageError`] are per-file and only reduce the
//!   final counters.

use std::fmt;
use thiserror::Error;

/// Enumeration failure pinned to the remote resource that caused it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not list {location}: {message}")]
pub struct ListEntriesError {
    /// URL of the resource that failed
    pub location: String,
    pub message: String,
}

impl ListEntriesError {
    pub fn new(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Returned by sources that only support deep enumeration
    pub fn not_implemented(location: impl Into<String>) -> Self {
        Self::new(location, "directory listing is not implemented for this source type")
    }
}

/// Failure while talking to a source for a single file
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("source is not connected")]
    NotConnected,

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("could not read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure from the destination object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("authentication against the object store failed: {0}")]
    Authentication(String),

    #[error("could not create container {container}: {message}")]
    CreateContainer { container: String, message: String },

    #[error("could not read state of {container}/{object}: {message}")]
    ReadObject {
        container: String,
        object: String,
        message: String,
    },

    #[error("could not write {container}/{object}: {message}")]
    WriteObject {
        container: String,
        object: String,
        message: String,
    },
}

/// A single configuration validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{job}: {field}: {message}")]
pub struct ConfigError {
    /// Job name, e.g. `jobs[2]`, or the top-level section name
    pub job: String,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(job: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Fatal errors raised before the pipeline starts
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("could not read configuration {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration {path}: {source}")]
    ParseConfig {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration is invalid:\n{}", format_config_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("could not load TLS material for {job} from {path}: {message}")]
    TlsMaterial {
        job: String,
        path: String,
        message: String,
    },

    #[error("could not build HTTP client for {job}: {source}")]
    HttpClient {
        job: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not connect source for {job}: {source}")]
    Connect {
        job: String,
        #[source]
        source: SourceError,
    },
}

fn format_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
