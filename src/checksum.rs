//! Scratch buffer that checksums everything written into it.

use flate2::Crc;

/// Decompressed bytes of the current entry plus their running CRC32.
///
/// One instance is reused for every entry of an archive; [`reset`](Self::reset)
/// clears both the bytes and the checksum.
pub struct CheckedBuffer {
    data: Vec<u8>,
    crc: Crc,
}

impl CheckedBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            crc: Crc::new(),
        }
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.crc.reset();
    }

    pub fn write(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.crc.update(chunk);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// CRC32 of everything written since the last reset
    pub fn crc32(&self) -> u32 {
        self.crc.sum()
    }
}

impl Default for CheckedBuffer {
    fn default() -> Self {
        Self::new()
    }
}
