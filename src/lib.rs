//! # zipdoc
//!
//! Render ZIP based documents as diffable text.
//!
//! Office documents, EPUBs and many other formats are ZIP archives full of
//! XML. This crate turns such an archive into a deterministic transcript, one
//! block per entry in archive order:
//!
//! ```text
//! Sub-file:	word/document.xml	size=2048	compressed=512	crc=a1b2c3d	modified=2024-01-01 12:00:00
//! <w:document>
//!   ...
//! </w:document>
//!
//! Sub-file:	word/media/image1.png	size=10	compressed=10	crc=e38a6876	modified=2024-01-01 12:00:00
//! File size:	10
//! Checksum:	e38a6876
//!
//! ```
//!
//! `.xml`/`.xhtml` entries are pretty-printed, `.txt` entries copied verbatim,
//! and everything else summarized by size and CRC32. Used as a git `textconv`
//! driver, this makes changes inside such documents show up as text diffs.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> zipdoc::Result<()> {
//!     let mut stdout = tokio::io::stdout();
//!     let summary = zipdoc::convert_path(Path::new("report.docx"), &mut stdout).await?;
//!     eprintln!("{} entries", summary.entries());
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod classify;
pub mod cli;
pub mod convert;
pub mod error;
pub mod io;
pub mod render;
pub mod zip;

pub use classify::{Classification, classify};
pub use cli::Cli;
pub use convert::{Converter, Summary};
pub use error::{Error, Result, XmlError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use render::XmlStyle;
pub use crate::zip::{ZipEntry, ZipEntryStream};

use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Convert the ZIP file at `path`, writing its transcript to `sink`.
///
/// The file is closed when this returns, whether or not conversion succeeded.
pub async fn convert_path<W>(path: &Path, sink: &mut W) -> Result<Summary>
where
    W: AsyncWrite + Unpin,
{
    let reader = Arc::new(LocalFileReader::new(path)?);
    Converter::new().convert(reader, sink).await
}
