//! Test doubles for pipeline unit tests

use crate::error::{ConfigError, ListEntriesError, SourceError};
use crate::file::{FileSpec, FileState};
use crate::job::{Filters, Job, Target, TlsMaterial};
use crate::source::{FetchedFile, Source};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Source serving a fixed tree from memory
#[derive(Debug, Default)]
pub struct StaticSource {
    /// Directory path -> entries; a missing directory fails to list
    pub listings: HashMap<String, Vec<FileSpec>>,
    /// When set, the source only supports deep enumeration
    pub full: Option<Vec<FileSpec>>,
    pub bodies: HashMap<String, Vec<u8>>,
    /// `get_file` never completes
    pub hang_on_get: bool,
    pub get_calls: Arc<AtomicUsize>,
}

impl StaticSource {
    /// Flat root directory with the given files
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let mut source = Self::default();
        source.listings.insert(
            String::new(),
            files.iter().map(|(path, _)| FileSpec::file(*path)).collect(),
        );
        for (path, body) in files {
            source.bodies.insert(path.to_string(), body.as_bytes().to_vec());
        }
        source
    }

    fn state_of(&self, path: &str) -> Result<FileState, SourceError> {
        let body = self.bodies.get(path).ok_or(SourceError::UnexpectedStatus {
            url: path.to_string(),
            status: 404,
        })?;
        Ok(FileState {
            size_bytes: Some(body.len() as u64),
            etag: Some(format!("\"{}-{}\"", body.len(), body.first().copied().unwrap_or(0))),
            ..FileState::default()
        })
    }
}

#[async_trait]
impl Source for StaticSource {
    fn validate(&self, _name: &str) -> Vec<ConfigError> {
        Vec::new()
    }

    fn set_http_client(&mut self, _client: reqwest::Client) {}

    async fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn supports_directory_listing(&self) -> bool {
        self.full.is_none()
    }

    async fn list_entries(&self, directory: &str) -> Result<Vec<FileSpec>, ListEntriesError> {
        self.listings
            .get(directory)
            .cloned()
            .ok_or_else(|| ListEntriesError::new(format!("memory:///{directory}"), "no such directory"))
    }

    async fn probe_file(&self, path: &str) -> Result<FileState, SourceError> {
        self.state_of(path)
    }

    async fn get_file(&self, path: &str, previous: &FileState) -> Result<FetchedFile, SourceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_get {
            std::future::pending::<()>().await;
        }
        let state = self.state_of(path)?;
        if previous.etag.is_some() && previous.etag == state.etag {
            return Ok(FetchedFile {
                body: None,
                state: previous.clone(),
            });
        }
        Ok(FetchedFile {
            body: self.bodies.get(path).cloned(),
            state,
        })
    }

    async fn list_all_files(&self) -> Result<Vec<FileSpec>, ListEntriesError> {
        match self.full {
            Some(ref files) => Ok(files.clone()),
            None => Err(ListEntriesError::new("memory:///", "not a deep source")),
        }
    }
}

pub fn job(index: usize, source: StaticSource, container: &str) -> Arc<Job> {
    filtered_job(index, source, container, None, None)
}

pub fn filtered_job(
    index: usize,
    source: StaticSource,
    container: &str,
    except: Option<&str>,
    only: Option<&str>,
) -> Arc<Job> {
    Arc::new(Job {
        name: Job::name_for(index),
        source: Box::new(source),
        target: Target {
            container: container.to_string(),
            object_prefix: String::new(),
        },
        filters: Filters {
            except: except.and_then(|p| Regex::new(p).ok()),
            only: only.and_then(|p| Regex::new(p).ok()),
        },
        tls: TlsMaterial::default(),
    })
}
