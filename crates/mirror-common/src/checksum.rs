//! Checksum utilities for content verification
//!
//! Repository metadata advertises digests as an algorithm name plus a hex
//! string (`<checksum type="sha256">…</checksum>` in Yum metadata). They are
//! carried around as `algorithm:hex` strings and verified against downloaded
//! content when the algorithm is one we can compute.

use crate::error::{MirrorError, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Digest algorithm named by a checksum
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
    /// Any algorithm we carry through but cannot compute (sha1, md5, ...)
    Other(String),
}

impl ChecksumAlgorithm {
    /// Parse an algorithm name as it appears in metadata (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => ChecksumAlgorithm::Sha256,
            "sha512" => ChecksumAlgorithm::Sha512,
            other => ChecksumAlgorithm::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
            ChecksumAlgorithm::Other(name) => name,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expected digest of some content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest
    pub value: String,
}

impl Checksum {
    pub fn new(algorithm: &str, value: &str) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::from_name(algorithm.trim()),
            value: value.trim().to_ascii_lowercase(),
        }
    }

    /// Whether [`Checksum::verify`] can actually compute this digest
    pub fn is_verifiable(&self) -> bool {
        !matches!(self.algorithm, ChecksumAlgorithm::Other(_))
    }

    /// Check `data` against this digest
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let actual = compute_checksum(data, &self.algorithm)?;
        if actual == self.value {
            Ok(())
        } else {
            Err(MirrorError::ChecksumMismatch {
                expected: self.to_string(),
                actual: format!("{}:{}", self.algorithm, actual),
            })
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

impl FromStr for Checksum {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((algorithm, value)) if !algorithm.is_empty() && !value.is_empty() => {
                Ok(Checksum::new(algorithm, value))
            },
            _ => Err(MirrorError::InvalidChecksum(s.to_string())),
        }
    }
}

/// Compute the lowercase hex digest of `data`
pub fn compute_checksum(data: &[u8], algorithm: &ChecksumAlgorithm) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => Ok(hex::encode(Sha256::digest(data))),
        ChecksumAlgorithm::Sha512 => Ok(hex::encode(Sha512::digest(data))),
        ChecksumAlgorithm::Other(name) => Err(MirrorError::UnsupportedAlgorithm(name.clone())),
    }
}
