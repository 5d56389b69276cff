//! Remote origins that files are mirrored from
//!
//! Every origin implements [`Source`]. Directory-shaped origins answer
//! [`Source::list_entries`] one directory at a time; format-aware origins such
//! as Yum repositories enumerate everything in one go through
//! [`Source::list_all_files`] and report directory listing as unsupported.
//!
//! Sources are configured in two steps. They are constructed and validated
//! without any I/O, then bootstrap installs the job's HTTP client and calls
//! [`Source::connect`] once before the pipeline shares them.

use crate::config::{SourceConfig, SourceKind};
use crate::error::{ConfigError, ListEntriesError, SourceError};
use crate::file::{FileSpec, FileState};
use async_trait::async_trait;
use std::fmt;

pub mod url;
pub mod yum;

pub use self::url::UrlSource;
pub use self::yum::YumSource;

/// Result of [`Source::get_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// `None` when the source answered "not modified"
    pub body: Option<Vec<u8>>,
    pub state: FileState,
}

#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Check the configuration without touching the network
    fn validate(&self, name: &str) -> Vec<ConfigError>;

    /// Install the HTTP client built for this job
    fn set_http_client(&mut self, client: reqwest::Client);

    /// Prepare session state; called exactly once before enumeration
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Whether [`Source::list_entries`] is supported
    fn supports_directory_listing(&self) -> bool {
        true
    }

    /// Shallow listing of one directory (`""` is the root)
    async fn list_entries(&self, directory: &str) -> Result<Vec<FileSpec>, ListEntriesError>;

    /// Cheap metadata lookup of a single file
    async fn probe_file(&self, path: &str) -> Result<FileState, SourceError>;

    /// Fetch a file, conditionally on it differing from `previous`
    async fn get_file(&self, path: &str, previous: &FileState) -> Result<FetchedFile, SourceError>;

    /// Every file below the source root
    ///
    /// Walks directories depth-first through [`Source::list_entries`].
    async fn list_all_files(&self) -> Result<Vec<FileSpec>, ListEntriesError> {
        let mut files = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(directory) = pending.pop() {
            let entries = self.list_entries(&directory).await?;
            // reversed so that the stack yields subdirectories in listing order
            for entry in entries.into_iter().rev() {
                if entry.is_directory {
                    pending.push(entry.path);
                } else {
                    files.push(entry);
                }
            }
        }

        Ok(files)
    }
}

/// Construct the source variant named by the configuration
pub fn from_config(config: &SourceConfig) -> Box<dyn Source> {
    let url = UrlSource::new(config.url.clone());
    match config.kind {
        SourceKind::Url => Box::new(url),
        SourceKind::Yum => Box::new(YumSource::new(url)),
    }
}
