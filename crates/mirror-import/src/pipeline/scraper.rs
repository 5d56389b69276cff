//! Enumeration work queue shared by all jobs

use crate::file::{File, FileSpec};
use crate::job::Job;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug)]
enum Task {
    /// List one directory of a directory-shaped source
    Directory { job: Arc<Job>, path: String },
    /// Enumerate a format-aware source in one go
    Full { job: Arc<Job> },
}

impl Task {
    fn job(&self) -> &Arc<Job> {
        match self {
            Task::Directory { job, .. } | Task::Full { job } => job,
        }
    }
}

/// Pending enumeration work, one unit per [`Scraper::next`] call
#[derive(Debug)]
pub struct Scraper {
    tasks: VecDeque<Task>,
}

impl Scraper {
    pub fn new(jobs: &[Arc<Job>]) -> Self {
        let tasks = jobs
            .iter()
            .map(|job| {
                if job.source.supports_directory_listing() {
                    Task::Directory {
                        job: Arc::clone(job),
                        path: String::new(),
                    }
                } else {
                    Task::Full { job: Arc::clone(job) }
                }
            })
            .collect();
        Self { tasks }
    }

    pub fn is_done(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Process one directory (or one whole format-aware source) and return the
    /// files discovered in it
    ///
    /// A listing failure is logged and drops every remaining task of that job.
    /// Entries with an empty path are dropped, since an empty path marks the
    /// end of the stream downstream.
    pub async fn next(&mut self) -> Vec<File> {
        let Some(task) = self.tasks.pop_front() else {
            return Vec::new();
        };
        let job = Arc::clone(task.job());

        let listing = match task {
            Task::Directory { ref path, .. } => job.source.list_entries(path).await,
            Task::Full { .. } => job.source.list_all_files().await,
        };

        let entries = match listing {
            Ok(entries) => entries,
            Err(e) => {
                error!(job = %job.name, location = %e.location, error = %e.message, "Enumeration failed");
                self.tasks.retain(|task| !Arc::ptr_eq(task.job(), &job));
                return Vec::new();
            },
        };

        let mut files = Vec::new();
        for entry in entries {
            if entry.path.is_empty() {
                warn!(job = %job.name, "Skipping entry with an empty path");
            } else if entry.is_directory {
                self.push_directory(&job, entry);
            } else if job.filters.accepts_file(&entry.path) {
                files.push(File::new(Arc::clone(&job), entry));
            } else {
                debug!(job = %job.name, path = %entry.path, "Skipping filtered file");
            }
        }
        files
    }

    fn push_directory(&mut self, job: &Arc<Job>, entry: FileSpec) {
        if !job.filters.accepts_directory(&entry.path) {
            debug!(job = %job.name, path = %entry.path, "Skipping filtered directory");
            return;
        }
        self.tasks.push_back(Task::Directory {
            job: Arc::clone(job),
            path: entry.path,
        });
    }
}
