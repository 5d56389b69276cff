//! Gzip handling for fetched metadata documents
//!
//! Remote metadata may or may not be compressed regardless of its file name,
//! so documents are sniffed for the gzip magic bytes instead of trusting the
//! extension.

use crate::error::{MirrorError, Result};
use flate2::read::MultiGzDecoder;
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

/// Gzip magic number followed by the deflate compression method
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Whether `data` starts with the gzip magic number
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Decompress gzip-compressed data, including every member of a
/// multi-member stream
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| MirrorError::Decompression(e.to_string()))?;
    debug!("Decompressed {} -> {} bytes", data.len(), decompressed.len());
    Ok(decompressed)
}

/// Return the plain document: decompressed if it carries the gzip magic
/// number, borrowed unchanged otherwise
pub fn decode_document(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if is_gzip(data) {
        decompress_gzip(data).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(data))
    }
}
