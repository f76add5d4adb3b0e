use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// Signatures that end the run of local file headers
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
pub const EOCD64_SIGNATURE: &[u8] = b"PK\x06\x06";

/// Extra field ID of the ZIP64 extended information record
const ZIP64_EXTRA_ID: u16 = 0x0001;
const ZIP64_MAGIC: u32 = 0xFFFF_FFFF;

/// General purpose flag bits
const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// Local File Header (LFH) - 30 bytes, followed by name and extra field
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::archive("invalid local file header"));
        }

        // Version needed to extract is not checked
        let mut cursor = Cursor::new(&data[6..Self::SIZE]);

        Ok(Self {
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?),
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Sizes and CRC follow the data instead of living in this header
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// 64-bit sizes from a ZIP64 extended information extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Sizes {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
}

/// Scan an extra field block for the ZIP64 record.
///
/// A 64-bit value is only present when the matching 32-bit header field holds
/// `0xFFFFFFFF`, uncompressed size first.
pub fn parse_zip64_extra(extra: &[u8], header: &LocalFileHeader) -> Result<Option<Zip64Sizes>> {
    let mut cursor = Cursor::new(extra);
    let end = extra.len() as u64;

    while cursor.position() + 4 <= end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = cursor.position() + field_size;
        if field_end > end {
            return Err(Error::archive("extra field overruns its header"));
        }

        if header_id == ZIP64_EXTRA_ID {
            let mut sizes = Zip64Sizes {
                uncompressed_size: None,
                compressed_size: None,
            };
            if header.uncompressed_size == ZIP64_MAGIC && cursor.position() + 8 <= field_end {
                sizes.uncompressed_size = Some(cursor.read_u64::<LittleEndian>()?);
            }
            if header.compressed_size == ZIP64_MAGIC && cursor.position() + 8 <= field_end {
                sizes.compressed_size = Some(cursor.read_u64::<LittleEndian>()?);
            }
            return Ok(Some(sizes));
        }

        cursor.set_position(field_end);
    }

    Ok(None)
}

/// Data descriptor trailing an entry written with flag bit 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    /// Optional signature in front of the descriptor
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";

    /// Bytes to fetch so that the largest layout (signature + ZIP64 sizes) fits
    pub const MAX_SIZE: usize = 24;

    /// Parse a descriptor, returning it with its length on disk.
    ///
    /// `zip64` selects 8-byte size fields.
    pub fn from_bytes(data: &[u8], zip64: bool) -> Result<(Self, usize)> {
        let signed = data.len() >= 4 && &data[0..4] == Self::SIGNATURE;
        let start = if signed { 4 } else { 0 };
        let size_width = if zip64 { 8 } else { 4 };
        let len = start + 4 + 2 * size_width;
        if data.len() < len {
            return Err(Error::archive("truncated data descriptor"));
        }

        let mut cursor = Cursor::new(&data[start..len]);
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let (compressed_size, uncompressed_size) = if zip64 {
            (
                cursor.read_u64::<LittleEndian>()?,
                cursor.read_u64::<LittleEndian>()?,
            )
        } else {
            (
                cursor.read_u32::<LittleEndian>()? as u64,
                cursor.read_u32::<LittleEndian>()? as u64,
            )
        };

        Ok((
            Self {
                crc32,
                compressed_size,
                uncompressed_size,
            },
            len,
        ))
    }
}

/// Fully read ZIP entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

impl ZipEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// The entry descriptor printed after `Sub-file:` in the transcript.
impl fmt::Display for ZipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        write!(
            f,
            "{}\tsize={}\tcompressed={}\tcrc={:x}\tmodified={:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.file_name,
            self.uncompressed_size,
            self.compressed_size,
            self.crc32,
            year,
            month,
            day,
            hour,
            minute,
            second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(flags: u16, method: u16, csize: u32, size: u32) -> Vec<u8> {
        let mut data = Vec::from(LocalFileHeader::SIGNATURE);
        data.extend_from_slice(&20u16.to_le_bytes());
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&method.to_le_bytes());
        data.extend_from_slice(&0x6000u16.to_le_bytes());
        data.extend_from_slice(&0x5821u16.to_le_bytes());
        data.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        data.extend_from_slice(&csize.to_le_bytes());
        data.extend_from_slice(&size.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data
    }

    #[test]
    fn parses_local_file_header() {
        let header = LocalFileHeader::from_bytes(&header_bytes(0x0008, 8, 10, 20)).unwrap();
        assert_eq!(header.compression_method, CompressionMethod::Deflate);
        assert_eq!(header.crc32, 0xDEADBEEF);
        assert_eq!(header.compressed_size, 10);
        assert_eq!(header.uncompressed_size, 20);
        assert_eq!(header.file_name_length, 5);
        assert!(header.has_data_descriptor());
        assert!(!header.is_encrypted());
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut data = header_bytes(0, 0, 0, 0);
        data[2] = 0x01;
        data[3] = 0x02;
        assert!(matches!(
            LocalFileHeader::from_bytes(&data),
            Err(Error::Archive(_))
        ));
    }

    #[test]
    fn zip64_extra_only_overrides_saturated_fields() {
        let header = LocalFileHeader::from_bytes(&header_bytes(0, 8, 0xFFFF_FFFF, 0xFFFF_FFFF)).unwrap();

        let mut extra = Vec::new();
        // Unrelated extended timestamp field first
        extra.extend_from_slice(&0x5455u16.to_le_bytes());
        extra.extend_from_slice(&5u16.to_le_bytes());
        extra.extend_from_slice(&[1, 0, 0, 0, 0]);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&(5u64 << 32).to_le_bytes());
        extra.extend_from_slice(&(3u64 << 32).to_le_bytes());

        let sizes = parse_zip64_extra(&extra, &header).unwrap().unwrap();
        assert_eq!(sizes.uncompressed_size, Some(5u64 << 32));
        assert_eq!(sizes.compressed_size, Some(3u64 << 32));

        let small = LocalFileHeader::from_bytes(&header_bytes(0, 8, 10, 20)).unwrap();
        let sizes = parse_zip64_extra(&extra, &small).unwrap().unwrap();
        assert_eq!(sizes.uncompressed_size, None);
        assert_eq!(sizes.compressed_size, None);
    }

    #[test]
    fn data_descriptor_with_and_without_signature() {
        let mut unsigned = Vec::new();
        unsigned.extend_from_slice(&0x352441C2u32.to_le_bytes());
        unsigned.extend_from_slice(&5u32.to_le_bytes());
        unsigned.extend_from_slice(&3u32.to_le_bytes());
        let (dd, len) = DataDescriptor::from_bytes(&unsigned, false).unwrap();
        assert_eq!(len, 12);
        assert_eq!(dd.crc32, 0x352441C2);
        assert_eq!(dd.compressed_size, 5);
        assert_eq!(dd.uncompressed_size, 3);

        let mut signed = Vec::from(DataDescriptor::SIGNATURE);
        signed.extend_from_slice(&0x352441C2u32.to_le_bytes());
        signed.extend_from_slice(&5u64.to_le_bytes());
        signed.extend_from_slice(&3u64.to_le_bytes());
        let (dd, len) = DataDescriptor::from_bytes(&signed, true).unwrap();
        assert_eq!(len, 24);
        assert_eq!(dd.uncompressed_size, 3);
    }

    #[test]
    fn descriptor_string_lists_metadata() {
        let entry = ZipEntry {
            file_name: "word/document.xml".to_string(),
            compression_method: CompressionMethod::Deflate,
            compressed_size: 512,
            uncompressed_size: 2048,
            crc32: 0x0a1b2c3d,
            // 12:00:00 on 2024-01-01
            last_mod_time: 0x6000,
            last_mod_date: 0x5821,
        };
        assert_eq!(
            entry.to_string(),
            "word/document.xml\tsize=2048\tcompressed=512\tcrc=a1b2c3d\tmodified=2024-01-01 12:00:00"
        );
    }
}
