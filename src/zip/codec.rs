//! Entry decoding, delegated to `flate2` for DEFLATE data.

use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::error::{Error, Result};

use super::structures::CompressionMethod;

/// Decode the raw bytes of one entry.
///
/// Output is capped one byte past `declared_size`, which is enough for the
/// caller to notice an oversized entry without inflating all of it.
pub fn decode(method: CompressionMethod, raw: &[u8], declared_size: u64) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(raw.to_vec()),
        CompressionMethod::Deflate => {
            let limit = declared_size.saturating_add(1);
            let mut out = Vec::with_capacity(declared_size.min(64 * 1024 * 1024) as usize);
            DeflateDecoder::new(raw)
                .take(limit)
                .read_to_end(&mut out)
                .map_err(|e| Error::invalid(format!("corrupt deflate stream: {}", e)))?;
            Ok(out)
        }
        CompressionMethod::Unknown(m) => Err(Error::UnsupportedCompression(m)),
    }
}
