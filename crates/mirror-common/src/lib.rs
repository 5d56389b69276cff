//! Object Mirror Common Library
//!
//! Shared error type and helpers for the object-mirror workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`MirrorError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: parsing and verifying `algorithm:hex` digests as they
//!   appear in repository metadata
//! - **Decompression**: gzip magic-number detection for fetched documents
//!
//! # Example
//!
//! ```no_run
//! use mirror_common::checksum::Checksum;
//! use mirror_common::decompression::decode_document;
//!
//! fn verify(raw: &[u8]) -> mirror_common::Result<()> {
//!     let document = decode_document(raw)?;
//!     let expected: Checksum = "sha256:0123abcd".parse()?;
//!     expected.verify(&document)?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod decompression;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{MirrorError, Result};
