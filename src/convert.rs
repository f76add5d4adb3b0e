//! The per-entry conversion loop.

use log::debug;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::checksum::CheckedBuffer;
use crate::classify::{Classification, classify};
use crate::error::{Error, Result};
use crate::io::ReadAt;
use crate::render::{XmlStyle, render};
use crate::zip::{ZipEntry, ZipEntryStream};

/// Tag opening every entry block of the transcript
pub const HEADER_TAG: &str = "Sub-file:";

/// What a successful conversion went through
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub xml_entries: usize,
    pub text_entries: usize,
    pub binary_entries: usize,
    /// Total decompressed bytes
    pub total_bytes: u64,
}

impl Summary {
    pub fn entries(&self) -> usize {
        self.xml_entries + self.text_entries + self.binary_entries
    }

    fn record(&mut self, classification: Classification, entry: &ZipEntry) {
        match classification {
            Classification::Xml => self.xml_entries += 1,
            Classification::PlainText => self.text_entries += 1,
            Classification::Binary => self.binary_entries += 1,
        }
        self.total_bytes += entry.uncompressed_size;
    }
}

/// Converts archives into transcripts.
///
/// The scratch buffers are reused across entries and across calls, so one
/// converter can process several archives in turn.
pub struct Converter {
    style: XmlStyle,
    scratch: CheckedBuffer,
    block: Vec<u8>,
}

impl Converter {
    pub fn new() -> Self {
        Self::with_style(XmlStyle::default())
    }

    pub fn with_style(style: XmlStyle) -> Self {
        Self {
            style,
            scratch: CheckedBuffer::new(),
            block: Vec::new(),
        }
    }

    /// Write the transcript of the archive behind `reader` to `sink`.
    ///
    /// Blocks are written as entries complete; on failure everything before
    /// the failing entry (and the header of a malformed XML entry) stays in
    /// the sink. The sink is flushed on every exit path.
    pub async fn convert<R, W>(&mut self, reader: Arc<R>, sink: &mut W) -> Result<Summary>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        let mut stream = ZipEntryStream::new(reader);
        let mut summary = Summary::default();

        let result = self.convert_entries(&mut stream, sink, &mut summary).await;
        let flushed = sink.flush().await;
        result?;
        flushed?;

        Ok(summary)
    }

    async fn convert_entries<R, W>(
        &mut self,
        stream: &mut ZipEntryStream<R>,
        sink: &mut W,
        summary: &mut Summary,
    ) -> Result<()>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        while let Some(entry) = stream.next_entry(&mut self.scratch).await? {
            let classification = classify(&entry.file_name);
            debug!(
                "{} as {:?}: {} bytes ({} compressed)",
                entry.file_name, classification, entry.uncompressed_size, entry.compressed_size
            );

            let header = format!("{HEADER_TAG}\t{entry}\n");
            sink.write_all(header.as_bytes()).await?;

            self.block.clear();
            render(classification, &self.scratch, &self.style, &mut self.block).map_err(
                |source| Error::Xml {
                    entry: entry.file_name.clone(),
                    source,
                },
            )?;
            self.block.push(b'\n');
            sink.write_all(&self.block).await?;

            summary.record(classification, &entry);
        }

        Ok(())
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}
