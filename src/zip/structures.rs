use byteorder::{LittleEndian, ReadBytesExt};
use std::borrow::Cow;
use std::io::Cursor;

use crate::error::FormatError;

/// Central Directory File Header signature and fixed size (variable tail follows)
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: &[u8] = b"PK\x01\x02";
pub(crate) const CENTRAL_DIRECTORY_FIXED_SIZE: usize = 46;

/// Local File Header signature and fixed size (variable tail follows)
pub(crate) const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";
pub(crate) const LOCAL_HEADER_FIXED_SIZE: usize = 30;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Classic End of Central Directory record - 22 bytes plus comment
pub(crate) struct EndOfCentralDirectory {
    pub entry_count: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_length: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Decode from a buffer starting at the signature.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < Self::SIZE || &data[..4] != Self::SIGNATURE {
            return Err(FormatError::CorruptArchive);
        }
        Self::decode(&data[4..]).map_err(|_| FormatError::CorruptArchive)
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u16::<LittleEndian>()?;
        let _entries_on_disk = cursor.read_u16::<LittleEndian>()?;
        let entry_count = cursor.read_u16::<LittleEndian>()?;
        let central_directory_size = cursor.read_u32::<LittleEndian>()?;
        let central_directory_offset = cursor.read_u32::<LittleEndian>()?;
        let comment_length = cursor.read_u16::<LittleEndian>()?;
        Ok(Self {
            entry_count,
            central_directory_size,
            central_directory_offset,
            comment_length,
        })
    }

    /// True when any of the three fields the tail depends on is saturated
    /// and the real value lives in the ZIP64 end record.
    pub fn needs_zip64(&self) -> bool {
        self.entry_count == 0xFFFF
            || self.central_directory_size == 0xFFFF_FFFF
            || self.central_directory_offset == 0xFFFF_FFFF
    }
}

/// ZIP64 End of Central Directory record - 56 bytes fixed
pub(crate) struct Zip64EndOfCentralDirectory {
    pub entry_count: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    /// Decode from a buffer starting at the signature.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < Self::SIZE || &data[..4] != Self::SIGNATURE {
            return Err(FormatError::Zip64RecordMissing);
        }
        Self::decode(&data[4..]).map_err(|_| FormatError::Zip64RecordMissing)
    }

    fn decode(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let _record_size = cursor.read_u64::<LittleEndian>()?;
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _disk_number = cursor.read_u32::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u32::<LittleEndian>()?;
        let _entries_on_disk = cursor.read_u64::<LittleEndian>()?;
        let entry_count = cursor.read_u64::<LittleEndian>()?;
        let central_directory_size = cursor.read_u64::<LittleEndian>()?;
        let central_directory_offset = cursor.read_u64::<LittleEndian>()?;
        Ok(Self {
            entry_count,
            central_directory_size,
            central_directory_offset,
        })
    }
}

/// Location and extent of the central directory, normalized to 64 bits.
///
/// Produced once per archive by the tail locator. Whether the values came
/// from the classic end record or its ZIP64 counterpart is resolved during
/// parsing; nothing downstream branches on the record shape again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTail {
    pub entry_count: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
}

/// One member's central directory record, immutable once parsed.
///
/// Size and offset fields are widened to 64 bits; when the on-disk 32-bit
/// fields were saturated, the values here come from the ZIP64 extended
/// information extra field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CentralDirectoryEntry {
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    /// Member name exactly as stored; not guaranteed to be UTF-8.
    pub file_name_raw: Vec<u8>,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
}

impl CentralDirectoryEntry {
    /// Exact on-disk size of this record, fixed part plus variable tail.
    /// The next record starts exactly this many bytes after this one.
    pub fn record_size(&self) -> u64 {
        CENTRAL_DIRECTORY_FIXED_SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
            + self.file_comment_length as u64
    }

    /// Member name for display, with invalid UTF-8 replaced.
    pub fn file_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.file_name_raw)
    }

    /// Unix permission bits from the external attributes (bits 16-24).
    pub fn unix_mode(&self) -> u16 {
        (self.external_attributes >> 16) as u16
    }

    pub fn is_directory(&self) -> bool {
        self.file_name_raw.last() == Some(&b'/')
    }
}

/// Fields of one member's local file header.
///
/// The size fields mirror the central directory entry's but are parsed
/// independently and are advisory only: streamed archives leave them zero
/// or saturated, so the central directory values stay authoritative. The
/// purpose of this record is computing where payload bytes begin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeaderInfo {
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalHeaderInfo {
    /// On-disk size of the header, fixed part plus variable tail.
    pub fn header_size(&self) -> u64 {
        LOCAL_HEADER_FIXED_SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
    }

    /// First payload byte of the member whose header starts at
    /// `local_header_offset`.
    pub fn payload_start(&self, local_header_offset: u64) -> u64 {
        local_header_offset + self.header_size()
    }
}
