//! Error types shared across the object-mirror crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Main error type for the helpers in this crate
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),
}
