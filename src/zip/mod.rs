//! ZIP container parsing and entry decoding.
//!
//! ## Architecture
//!
//! - [`structures`]: record types (EOCD, metadata footer, entries)
//! - [`parser`]: binary parsing of the trailing EOCD and central directory
//! - [`archive`]: entry listing and on-demand decoding
//! - [`codec`]: delegation of DEFLATE decoding to `flate2`
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Offsets inside the central directory are relative to the start of the
//! container, so a container must be read from its own byte range (the
//! scratch copy) rather than from the host executable.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64 records
//! - STORED and DEFLATE only

mod archive;
mod codec;
mod parser;
mod structures;

pub use archive::ContainerReader;
pub use codec::decode;
pub use parser::{ContainerParser, Directory};
pub use structures::*;
