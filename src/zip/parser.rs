//! Low-level ZIP metadata parsing.
//!
//! ZIP archives are read from the end:
//! 1. Find the end-of-central-directory record inside the trailing
//!    lookback window, switching to its ZIP64 counterpart when the
//!    classic fields are saturated
//! 2. Fetch the central directory in a single ranged read and walk it
//!    entry by entry
//! 3. Read a member's local file header only when the exact payload
//!    start offset is needed
//!
//! The decoding functions in this module are pure: they take a byte view
//! plus an offset and never touch the source themselves. [`ZipIndexReader`]
//! wraps them with the bounded [`ReadAt`] fetches each step needs, which
//! keeps transfer cost at a few KiB for archives of any size.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Result, bail};

use crate::error::FormatError;
use crate::io::ReadAt;

use super::structures::*;

/// Trailing window searched for the end-of-central-directory record.
///
/// The classic record's comment field is at most 64 KiB, so the record
/// itself can start no earlier than this far from the end of the archive.
const TAIL_LOOKBACK: u64 = 64 * 1024;

/// Extra-field tag of the ZIP64 extended information block.
const ZIP64_EXTRA_TAG: u16 = 0x0001;

/// Locate and decode the archive tail inside `window`, the last
/// `min(archive_size, 64 KiB)` bytes of the archive.
///
/// Scans backward for the end-of-central-directory signature, accepting
/// the first candidate whose comment length reaches exactly to the end of
/// the window. With `zip64` enabled, a saturated entry count, directory
/// size, or directory offset triggers a second backward scan for the
/// ZIP64 end record, whose 64-bit fields then replace all three values.
///
/// # Errors
///
/// * [`FormatError::CorruptArchive`] when no end record is found.
/// * [`FormatError::Zip64RecordMissing`] when a saturated field demands a
///   ZIP64 end record that is not in the window.
/// * [`FormatError::UnsupportedLargeArchive`] when `zip64` is disabled
///   and the directory offset does not fit a signed 32-bit value.
pub fn parse_archive_tail(window: &[u8], zip64: bool) -> Result<ArchiveTail, FormatError> {
    let mut eocd = None;
    if window.len() >= EndOfCentralDirectory::SIZE {
        for pos in (0..=window.len() - EndOfCentralDirectory::SIZE).rev() {
            if &window[pos..pos + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let candidate = EndOfCentralDirectory::from_bytes(&window[pos..])?;
            // A real end record is followed by its comment and nothing else.
            if pos + EndOfCentralDirectory::SIZE + candidate.comment_length as usize
                == window.len()
            {
                eocd = Some(candidate);
                break;
            }
        }
    }
    let eocd = eocd.ok_or(FormatError::CorruptArchive)?;

    if zip64 && eocd.needs_zip64() {
        let pos = rfind_record(
            window,
            Zip64EndOfCentralDirectory::SIGNATURE,
            Zip64EndOfCentralDirectory::SIZE,
        )
        .ok_or(FormatError::Zip64RecordMissing)?;
        let record = Zip64EndOfCentralDirectory::from_bytes(&window[pos..])?;
        return Ok(ArchiveTail {
            entry_count: record.entry_count,
            central_directory_size: record.central_directory_size,
            central_directory_offset: record.central_directory_offset,
        });
    }

    // A directory offset past the signed 32-bit range (the saturated
    // sentinel included) cannot be represented without ZIP64.
    if !zip64 && eocd.central_directory_offset > i32::MAX as u32 {
        return Err(FormatError::UnsupportedLargeArchive);
    }

    Ok(ArchiveTail {
        entry_count: eocd.entry_count as u64,
        central_directory_size: eocd.central_directory_size as u64,
        central_directory_offset: eocd.central_directory_offset as u64,
    })
}

/// Backward scan for a record signature, requiring `record_size` bytes of
/// room at the match.
fn rfind_record(window: &[u8], signature: &[u8], record_size: usize) -> Option<usize> {
    if window.len() < record_size {
        return None;
    }
    (0..=window.len() - record_size)
        .rev()
        .find(|&pos| &window[pos..pos + 4] == signature)
}

/// Decode one central directory record at `offset` into `buf`, returning
/// the entry together with the offset of the record that follows it.
///
/// The returned offset is exact: `offset + 46 + file_name_length +
/// extra_field_length + file_comment_length`, with no padding tolerated,
/// so walking the directory is a chain of these calls.
///
/// With `zip64` enabled, any saturated size or offset field is resolved
/// through the ZIP64 extended information extra field; the block stores
/// its 8-byte values in a fixed order (uncompressed size, compressed
/// size, local header offset) and carries only the saturated ones.
///
/// # Errors
///
/// * [`FormatError::CorruptCentralDirectoryEntry`] on a bad signature or
///   a record extending past the buffer.
/// * [`FormatError::Zip64ExtraFieldMissing`] when a required override is
///   absent or truncated.
pub fn parse_central_directory_entry(
    buf: &[u8],
    offset: usize,
    zip64: bool,
) -> Result<(CentralDirectoryEntry, usize), FormatError> {
    let corrupt = || FormatError::CorruptCentralDirectoryEntry {
        offset: offset as u64,
    };

    let record = buf.get(offset..).ok_or_else(corrupt)?;
    if record.len() < CENTRAL_DIRECTORY_FIXED_SIZE
        || &record[..4] != CENTRAL_DIRECTORY_SIGNATURE
    {
        return Err(corrupt());
    }
    let raw = decode_entry_fields(record).map_err(|_| corrupt())?;

    let record_size = CENTRAL_DIRECTORY_FIXED_SIZE
        + raw.file_name_length as usize
        + raw.extra_field_length as usize
        + raw.file_comment_length as usize;
    if record.len() < record_size {
        return Err(corrupt());
    }

    let name_end = CENTRAL_DIRECTORY_FIXED_SIZE + raw.file_name_length as usize;
    let file_name_raw = record[CENTRAL_DIRECTORY_FIXED_SIZE..name_end].to_vec();
    let extra = &record[name_end..name_end + raw.extra_field_length as usize];

    let mut compressed_size = raw.compressed_size as u64;
    let mut uncompressed_size = raw.uncompressed_size as u64;
    let mut local_header_offset = raw.local_header_offset as u64;

    if zip64
        && (raw.uncompressed_size == u32::MAX
            || raw.compressed_size == u32::MAX
            || raw.local_header_offset == u32::MAX)
    {
        let overrides = read_zip64_overrides(
            extra,
            raw.uncompressed_size == u32::MAX,
            raw.compressed_size == u32::MAX,
            raw.local_header_offset == u32::MAX,
        )
        .ok_or_else(|| FormatError::Zip64ExtraFieldMissing {
            file_name: String::from_utf8_lossy(&file_name_raw).into_owned(),
        })?;
        if let Some(value) = overrides.uncompressed_size {
            uncompressed_size = value;
        }
        if let Some(value) = overrides.compressed_size {
            compressed_size = value;
        }
        if let Some(value) = overrides.local_header_offset {
            local_header_offset = value;
        }
    }

    let entry = CentralDirectoryEntry {
        compression_method: CompressionMethod::from_u16(raw.compression_method),
        crc32: raw.crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
        internal_attributes: raw.internal_attributes,
        external_attributes: raw.external_attributes,
        file_name_raw,
        file_name_length: raw.file_name_length,
        extra_field_length: raw.extra_field_length,
        file_comment_length: raw.file_comment_length,
    };
    Ok((entry, offset + record_size))
}

/// Fixed central-directory fields, still at their on-disk widths.
struct RawEntryFields {
    compression_method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    file_name_length: u16,
    extra_field_length: u16,
    file_comment_length: u16,
    internal_attributes: u16,
    external_attributes: u32,
    local_header_offset: u32,
}

fn decode_entry_fields(record: &[u8]) -> std::io::Result<RawEntryFields> {
    let mut cursor = Cursor::new(record);
    cursor.set_position(4);
    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let internal_attributes = cursor.read_u16::<LittleEndian>()?;
    let external_attributes = cursor.read_u32::<LittleEndian>()?;
    let local_header_offset = cursor.read_u32::<LittleEndian>()?;
    Ok(RawEntryFields {
        compression_method,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_length,
        extra_field_length,
        file_comment_length,
        internal_attributes,
        external_attributes,
        local_header_offset,
    })
}

struct Zip64Overrides {
    uncompressed_size: Option<u64>,
    compressed_size: Option<u64>,
    local_header_offset: Option<u64>,
}

/// Walk the extra-field region for the ZIP64 block and pull the 8-byte
/// values for whichever fields were saturated. Returns `None` when the
/// block is absent, truncated, or shorter than the requested overrides.
fn read_zip64_overrides(
    extra: &[u8],
    want_uncompressed: bool,
    want_compressed: bool,
    want_offset: bool,
) -> Option<Zip64Overrides> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let tag = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let len = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let body = extra.get(pos + 4..pos + 4 + len)?;
        if tag == ZIP64_EXTRA_TAG {
            let mut cursor = Cursor::new(body);
            let mut overrides = Zip64Overrides {
                uncompressed_size: None,
                compressed_size: None,
                local_header_offset: None,
            };
            if want_uncompressed {
                overrides.uncompressed_size = Some(cursor.read_u64::<LittleEndian>().ok()?);
            }
            if want_compressed {
                overrides.compressed_size = Some(cursor.read_u64::<LittleEndian>().ok()?);
            }
            if want_offset {
                overrides.local_header_offset = Some(cursor.read_u64::<LittleEndian>().ok()?);
            }
            return Some(overrides);
        }
        pos += 4 + len;
    }
    None
}

/// Decode a local file header from a buffer starting at its signature.
///
/// The header's own size fields are decoded but advisory only; the
/// central directory entry stays authoritative for sizes. What this
/// record is for is the name and extra lengths that determine
/// [`LocalHeaderInfo::header_size`] and with it the payload start.
pub fn parse_local_header(buf: &[u8]) -> Result<LocalHeaderInfo, FormatError> {
    if buf.len() < LOCAL_HEADER_FIXED_SIZE || &buf[..4] != LOCAL_HEADER_SIGNATURE {
        return Err(FormatError::CorruptLocalHeader);
    }
    decode_local_header(buf).map_err(|_| FormatError::CorruptLocalHeader)
}

fn decode_local_header(buf: &[u8]) -> std::io::Result<LocalHeaderInfo> {
    let mut cursor = Cursor::new(buf);
    cursor.set_position(4);
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    Ok(LocalHeaderInfo {
        compression_method: CompressionMethod::from_u16(compression_method),
        crc32,
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
        file_name_length,
        extra_field_length,
    })
}

/// Archive index reader over any [`ReadAt`] source.
///
/// Performs the bounded reads each metadata step needs and hands the
/// bytes to the pure decoding functions above. Holding the source behind
/// an [`Arc`] lets the caller keep using it for payload fetches after
/// the index is built.
pub struct ZipIndexReader<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
    zip64: bool,
}

impl<R: ReadAt> ZipIndexReader<R> {
    /// Create an index reader with ZIP64 support enabled.
    pub fn new(reader: Arc<R>) -> Self {
        Self::with_zip64(reader, true)
    }

    /// Create an index reader, choosing whether ZIP64 records and extra
    /// fields are consulted. With ZIP64 disabled, archives whose central
    /// directory lies past the signed 32-bit range are rejected instead
    /// of being silently truncated.
    pub fn with_zip64(reader: Arc<R>, zip64: bool) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            zip64,
        }
    }

    /// Fetch the trailing lookback window and locate the archive tail.
    pub async fn archive_tail(&self) -> Result<ArchiveTail> {
        let window_len = self.size.min(TAIL_LOOKBACK);
        let window_start = self.size - window_len;
        let mut window = vec![0u8; window_len as usize];
        self.read_exact_at(window_start, &mut window).await?;
        Ok(parse_archive_tail(&window, self.zip64)?)
    }

    /// Read the whole central directory in one ranged request and walk
    /// it into entries.
    ///
    /// The walk is verified two ways: it must yield exactly the entry
    /// count the tail advertised, and it must consume exactly the
    /// directory size, each record abutting the next.
    pub async fn read_central_directory(&self) -> Result<Vec<CentralDirectoryEntry>> {
        let tail = self.archive_tail().await?;

        let mut directory = vec![0u8; tail.central_directory_size as usize];
        self.read_exact_at(tail.central_directory_offset, &mut directory)
            .await?;

        let mut entries = Vec::with_capacity(tail.entry_count as usize);
        let mut offset = 0usize;
        for _ in 0..tail.entry_count {
            let (entry, next_offset) =
                parse_central_directory_entry(&directory, offset, self.zip64)?;
            entries.push(entry);
            offset = next_offset;
        }

        if offset != directory.len() {
            bail!(
                "central directory walk consumed {} of {} bytes",
                offset,
                directory.len()
            );
        }

        Ok(entries)
    }

    /// Read and decode the local file header preceding `entry`'s payload.
    pub async fn local_header(&self, entry: &CentralDirectoryEntry) -> Result<LocalHeaderInfo> {
        let mut header = [0u8; LOCAL_HEADER_FIXED_SIZE];
        self.read_exact_at(entry.local_header_offset, &mut header)
            .await?;
        Ok(parse_local_header(&header)?)
    }

    /// Exact offset of the first payload byte of `entry`, computed from
    /// its local header's variable-length tail.
    pub async fn payload_offset(&self, entry: &CentralDirectoryEntry) -> Result<u64> {
        let header = self.local_header(entry).await?;
        Ok(header.payload_start(entry.local_header_offset))
    }

    /// The underlying byte source, for payload reads after planning.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Total archive size in bytes.
    pub fn archive_size(&self) -> u64 {
        self.size
    }

    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.reader.read_at(offset, buf).await?;
        if n != buf.len() {
            bail!(
                "short read from byte source: {} of {} bytes at offset {}",
                n,
                buf.len(),
                offset
            );
        }
        Ok(())
    }
}
