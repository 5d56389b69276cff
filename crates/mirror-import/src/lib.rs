//! Object Mirror importer
//!
//! Mirrors files from remote origins into S3-compatible object storage,
//! uploading only what changed since the last run.
//!
//! # Supported Sources
//!
//! - **url**: HTTP(S) directory trees served as HTML index pages
//! - **yum**: Yum repositories, enumerated from `repodata/repomd.xml`
//!
//! # Example
//!
//! ```no_run
//! use mirror_import::{bootstrap, config::Config, pipeline, storage::S3Store};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("mirror.yaml".as_ref())?;
//!     let jobs = bootstrap::build_jobs(&config)?;
//!     let store = Arc::new(S3Store::connect(&config.storage).await?);
//!     let jobs = bootstrap::prepare_jobs(jobs, store.as_ref(), &config.pipeline).await?;
//!
//!     let stats = pipeline::run(jobs, store, &config.pipeline, CancellationToken::new()).await;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod file;
pub mod job;
pub mod pipeline;
pub mod signal;
pub mod source;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BootstrapError, ConfigError, ListEntriesError, SourceError, StorageError};
pub use file::{File, FileSpec, FileState, TransferResult};
pub use job::Job;
pub use pipeline::RunStats;
pub use source::Source;
pub use storage::ObjectStore;
