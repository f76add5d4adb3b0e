//! Sequential ZIP entry reader.
//!
//! Entries are read front to back by following local file headers, the same
//! order a streaming unzip sees them. The central directory is never consulted:
//! its first signature simply marks the end of the entries.
//!
//! ## Reading an entry
//!
//! 1. Parse the Local File Header, name and extra field (ZIP64 sizes)
//! 2. Copy (STORED) or inflate (DEFLATE) the data into a [`CheckedBuffer`]
//! 3. If flag bit 3 is set, parse the data descriptor after the data
//! 4. Check the byte count and CRC32 against the declared values

use flate2::{Decompress, FlushDecompress, Status};
use log::trace;
use std::io;
use std::sync::Arc;

use crate::checksum::CheckedBuffer;
use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Size of each read from the archive and of each inflate output step
const CHUNK_SIZE: usize = 8192;

/// An entry whose local header has been parsed but whose data has not
struct LocalEntry {
    file_name: String,
    header: LocalFileHeader,
    compressed_size: u64,
    uncompressed_size: u64,
    zip64: bool,
    data_offset: u64,
}

/// Reads the entries of an archive in storage order.
///
/// ## Example
///
/// ```ignore
/// let mut stream = ZipEntryStream::new(reader);
/// let mut buf = CheckedBuffer::new();
/// while let Some(entry) = stream.next_entry(&mut buf).await? {
///     println!("{entry}: {} bytes", buf.len());
/// }
/// ```
pub struct ZipEntryStream<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Offset of the next record
    offset: u64,
    /// Entries read so far
    entries: usize,
}

impl<R: ReadAt> ZipEntryStream<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            reader,
            offset: 0,
            entries: 0,
        }
    }

    /// Read the next entry into `buf`.
    ///
    /// `buf` is reset first and afterwards holds the entry's decompressed
    /// bytes. Returns `None` once the central directory (or the end of the
    /// input) is reached.
    ///
    /// # Errors
    ///
    /// [`Error::Archive`] for truncated or corrupt data, including size and
    /// CRC mismatches; [`Error::Unsupported`] for encrypted entries and
    /// compression methods other than STORED and DEFLATE.
    pub async fn next_entry(&mut self, buf: &mut CheckedBuffer) -> Result<Option<ZipEntry>> {
        let Some(local) = self.read_local_header().await? else {
            return Ok(None);
        };

        buf.reset();
        let compressed_size = match local.header.compression_method {
            CompressionMethod::Stored => self.copy_stored(&local, buf).await?,
            CompressionMethod::Deflate => self.inflate(&local, buf).await?,
            CompressionMethod::Unknown(method) => {
                return Err(Error::Unsupported(format!(
                    "compression method {method} in {}",
                    local.file_name
                )));
            }
        };

        let entry = self.finish_entry(local, compressed_size, buf).await?;
        self.entries += 1;
        Ok(Some(entry))
    }

    async fn read_local_header(&mut self) -> Result<Option<LocalEntry>> {
        let mut fixed = [0u8; LocalFileHeader::SIZE];
        let n = self.read_up_to(self.offset, &mut fixed).await?;

        // A stream that stops cleanly between entries has no central directory
        if n == 0 && self.entries > 0 {
            return Ok(None);
        }
        if n < 4 {
            return Err(self.bad_record());
        }

        let signature = &fixed[0..4];
        if signature == CDFH_SIGNATURE
            || signature == EOCD_SIGNATURE
            || signature == EOCD64_SIGNATURE
        {
            trace!("end of entries at offset {}", self.offset);
            return Ok(None);
        }
        if signature != LocalFileHeader::SIGNATURE {
            return Err(self.bad_record());
        }
        if n < LocalFileHeader::SIZE {
            return Err(Error::archive(format!(
                "truncated local file header at offset {}",
                self.offset
            )));
        }

        let header = LocalFileHeader::from_bytes(&fixed)?;
        let name_len = header.file_name_length as usize;
        let mut variable = vec![0u8; name_len + header.extra_field_length as usize];
        self.reader
            .read_exact_at(self.offset + LocalFileHeader::SIZE as u64, &mut variable)
            .await
            .map_err(|e| truncated(e, "local file header"))?;

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&variable[..name_len]).into_owned();
        let zip64 = parse_zip64_extra(&variable[name_len..], &header)?;

        if header.is_encrypted() {
            return Err(Error::Unsupported(format!("encrypted entry {file_name}")));
        }
        if header.compression_method == CompressionMethod::Stored && header.has_data_descriptor() {
            return Err(Error::Unsupported(format!(
                "stored entry {file_name} with a data descriptor"
            )));
        }

        let compressed_size = zip64
            .and_then(|z| z.compressed_size)
            .unwrap_or(header.compressed_size as u64);
        let uncompressed_size = zip64
            .and_then(|z| z.uncompressed_size)
            .unwrap_or(header.uncompressed_size as u64);
        let data_offset = self.offset + (LocalFileHeader::SIZE + variable.len()) as u64;

        trace!("local header for {file_name} at offset {}", self.offset);

        Ok(Some(LocalEntry {
            file_name,
            header,
            compressed_size,
            uncompressed_size,
            zip64: zip64.is_some(),
            data_offset,
        }))
    }

    async fn copy_stored(&self, local: &LocalEntry, buf: &mut CheckedBuffer) -> Result<u64> {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut pos = local.data_offset;
        let mut remaining = local.compressed_size;

        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = self.reader.read_at(pos, &mut chunk[..want]).await?;
            if n == 0 {
                return Err(Error::archive(format!("truncated data for {}", local.file_name)));
            }
            buf.write(&chunk[..n]);
            pos += n as u64;
            remaining -= n as u64;
        }

        Ok(local.compressed_size)
    }

    /// Inflate raw DEFLATE data, returning the number of compressed bytes used.
    ///
    /// Without a data descriptor the compressed size bounds the reads;
    /// with one, the end of the DEFLATE stream marks the end of the data.
    async fn inflate(&self, local: &LocalEntry, buf: &mut CheckedBuffer) -> Result<u64> {
        let limit = if local.header.has_data_descriptor() {
            None
        } else {
            Some(local.compressed_size)
        };

        let mut inflater = Decompress::new(false);
        let mut input = vec![0u8; CHUNK_SIZE];
        let mut output = vec![0u8; CHUNK_SIZE];
        let (mut pos, mut filled, mut eof) = (0usize, 0usize, false);

        loop {
            // Refill only once the previous chunk is fully consumed, so
            // total_in is exactly the number of bytes read so far
            if pos == filled && !eof {
                let consumed = inflater.total_in();
                let want = match limit {
                    Some(limit) => (limit - consumed).min(CHUNK_SIZE as u64) as usize,
                    None => CHUNK_SIZE,
                };
                filled = if want == 0 {
                    0
                } else {
                    self.reader
                        .read_at(local.data_offset + consumed, &mut input[..want])
                        .await?
                };
                pos = 0;
                eof = filled == 0;
            }

            let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
            let status = inflater
                .decompress(&input[pos..filled], &mut output, FlushDecompress::None)
                .map_err(|e| {
                    Error::archive(format!("invalid DEFLATE data in {}: {e}", local.file_name))
                })?;
            let used = (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            pos += used;
            buf.write(&output[..produced]);

            if status == Status::StreamEnd {
                break;
            }
            if used == 0 && produced == 0 && (eof || pos < filled) {
                return Err(Error::archive(format!("truncated data for {}", local.file_name)));
            }
        }

        Ok(inflater.total_in())
    }

    async fn finish_entry(
        &mut self,
        local: LocalEntry,
        compressed_size: u64,
        buf: &CheckedBuffer,
    ) -> Result<ZipEntry> {
        let data_end = local.data_offset + compressed_size;

        let (crc32, declared_compressed, declared_size, next_offset) =
            if local.header.has_data_descriptor() {
                let zip64 = local.zip64
                    || compressed_size > u32::MAX as u64
                    || buf.len() > u32::MAX as u64;
                let mut raw = [0u8; DataDescriptor::MAX_SIZE];
                let n = self.read_up_to(data_end, &mut raw).await?;
                let (descriptor, len) = DataDescriptor::from_bytes(&raw[..n], zip64)?;
                (
                    descriptor.crc32,
                    descriptor.compressed_size,
                    descriptor.uncompressed_size,
                    data_end + len as u64,
                )
            } else {
                (
                    local.header.crc32,
                    local.compressed_size,
                    local.uncompressed_size,
                    data_end,
                )
            };

        if declared_compressed != compressed_size {
            return Err(Error::archive(format!(
                "invalid entry compressed size for {} (expected {declared_compressed} but got {compressed_size} bytes)",
                local.file_name
            )));
        }
        if declared_size != buf.len() {
            return Err(Error::archive(format!(
                "invalid entry size for {} (expected {declared_size} but got {} bytes)",
                local.file_name,
                buf.len()
            )));
        }
        if crc32 != buf.crc32() {
            return Err(Error::archive(format!(
                "invalid entry CRC for {} (expected 0x{crc32:x} but got 0x{:x})",
                local.file_name,
                buf.crc32()
            )));
        }

        self.offset = next_offset;

        Ok(ZipEntry {
            file_name: local.file_name,
            compression_method: local.header.compression_method,
            compressed_size,
            uncompressed_size: buf.len(),
            crc32: buf.crc32(),
            last_mod_time: local.header.last_mod_time,
            last_mod_date: local.header.last_mod_date,
        })
    }

    /// Read as many bytes as the source holds at `offset`, up to `buf.len()`.
    async fn read_up_to(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .reader
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn bad_record(&self) -> Error {
        if self.entries == 0 {
            Error::archive("not a ZIP archive (no local file header at offset 0)")
        } else {
            Error::archive(format!("invalid local file header at offset {}", self.offset))
        }
    }
}

fn truncated(err: io::Error, what: &str) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::archive(format!("truncated {what}"))
    } else {
        Error::Io(err)
    }
}
