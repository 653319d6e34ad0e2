//! Decompression utilities for PAK payloads.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::{Error, Result};

/// Upper bound on output buffer preallocation; declared sizes are untrusted.
pub const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Inflate one zlib stream, appending at most `limit` bytes to `output`.
///
/// Returns the number of bytes appended. A stream that would inflate past
/// `limit` is an error.
pub fn decompress_zlib(data: &[u8], limit: u64, output: &mut Vec<u8>) -> Result<usize> {
    let mut decoder = ZlibDecoder::new(data).take(limit.saturating_add(1));

    let appended = decoder
        .read_to_end(output)
        .map_err(|e| Error::PayloadDecode(format!("zlib: {e}")))?;

    if appended as u64 > limit {
        return Err(Error::PayloadDecode(format!(
            "zlib stream inflates past the {limit} bytes left for it"
        )));
    }

    trace!("zlib: {} bytes -> {} bytes", data.len(), appended);
    Ok(appended)
}

/// Inflate one zlib stream with a known output size.
pub fn decompress_zlib_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size.min(MAX_PREALLOCATION));
    decompress_zlib(data, expected_size as u64, &mut output)?;

    if output.len() != expected_size {
        return Err(Error::PayloadDecode(format!(
            "zlib size mismatch: expected {}, got {}",
            expected_size,
            output.len()
        )));
    }
    Ok(output)
}
