//! Streaming ZIP archive reading.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (local headers, data descriptors, ...)
//! - [`stream`]: Sequential reader that walks the local file headers and decompresses each entry
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Unlike an extractor, this reader only needs part 1: it visits the entries in
//! the order they are stored and stops at the Central Directory.
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE compression methods
//! - Data descriptors (general purpose flag bit 3), with or without signature
//! - ZIP64 sizes in the local extra field
//!
//! ## Limitations
//!
//! - No encryption support
//! - No BZIP2, LZMA, or other compression methods

mod stream;
mod structures;

pub use stream::ZipEntryStream;
pub use structures::*;
