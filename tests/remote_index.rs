//! End-to-end pipeline tests over hand-crafted archive bytes: locate the
//! tail, walk the central directory, compute payload offsets, and plan
//! merged ranges, all through the `ReadAt` boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use ziprange::{
    CompressionMethod, FormatError, LocalFileReader, ReadAt, ZipIndexReader, plan_merged_ranges,
};

/// In-memory byte source standing in for a remote archive.
struct SliceReader(Vec<u8>);

#[async_trait]
impl ReadAt for SliceReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.0.len());
        let end = (start + buf.len()).min(self.0.len());
        buf[..end - start].copy_from_slice(&self.0[start..end]);
        Ok(end - start)
    }

    fn size(&self) -> u64 {
        self.0.len() as u64
    }
}

struct Member {
    name: &'static [u8],
    data: &'static [u8],
}

const MEMBERS: &[Member] = &[
    Member {
        name: b"manifest.txt",
        data: b"name: sample\nversion: 3",
    },
    Member {
        name: b"assets/logo.bin",
        data: &[0xD0u8; 300],
    },
    Member {
        name: b"lib/arm64/module.so",
        data: &[0x7Fu8; 129],
    },
];

fn push_local_header(out: &mut Vec<u8>, name: &[u8], data_len: u32) {
    out.extend_from_slice(b"PK\x03\x04");
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // stored
    out.extend_from_slice(&0u16.to_le_bytes()); // mod time
    out.extend_from_slice(&0u16.to_le_bytes()); // mod date
    out.extend_from_slice(&0u32.to_le_bytes()); // crc
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra length
    out.extend_from_slice(name);
}

fn push_directory_record(
    out: &mut Vec<u8>,
    name: &[u8],
    compressed: u32,
    uncompressed: u32,
    local_header_offset: u32,
    extra: &[u8],
) {
    out.extend_from_slice(b"PK\x01\x02");
    out.extend_from_slice(&45u16.to_le_bytes()); // version made by
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // stored
    out.extend_from_slice(&0u16.to_le_bytes()); // mod time
    out.extend_from_slice(&0u16.to_le_bytes()); // mod date
    out.extend_from_slice(&0u32.to_le_bytes()); // crc
    out.extend_from_slice(&compressed.to_le_bytes());
    out.extend_from_slice(&uncompressed.to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment length
    out.extend_from_slice(&0u16.to_le_bytes()); // disk start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    out.extend_from_slice(&(0o100644u32 << 16).to_le_bytes()); // external attrs
    out.extend_from_slice(&local_header_offset.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(extra);
}

fn push_end_record(out: &mut Vec<u8>, entry_count: u16, directory_size: u32, directory_offset: u32) {
    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number
    out.extend_from_slice(&0u16.to_le_bytes()); // directory disk
    out.extend_from_slice(&entry_count.to_le_bytes()); // entries on disk
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&directory_size.to_le_bytes());
    out.extend_from_slice(&directory_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment length
}

/// Stored-only archive with every member packed back to back. Returns
/// the bytes plus each member's local header offset.
fn build_archive() -> (Vec<u8>, Vec<u64>) {
    let mut out = Vec::new();
    let mut header_offsets = Vec::new();

    for member in MEMBERS {
        header_offsets.push(out.len() as u64);
        push_local_header(&mut out, member.name, member.data.len() as u32);
        out.extend_from_slice(member.data);
    }

    let directory_offset = out.len();
    for (member, header_offset) in MEMBERS.iter().zip(&header_offsets) {
        push_directory_record(
            &mut out,
            member.name,
            member.data.len() as u32,
            member.data.len() as u32,
            *header_offset as u32,
            b"",
        );
    }
    let directory_size = out.len() - directory_offset;

    push_end_record(
        &mut out,
        MEMBERS.len() as u16,
        directory_size as u32,
        directory_offset as u32,
    );
    (out, header_offsets)
}

#[tokio::test]
async fn lists_every_member() {
    let (archive, header_offsets) = build_archive();
    let index = ZipIndexReader::new(Arc::new(SliceReader(archive)));

    let tail = index.archive_tail().await.unwrap();
    assert_eq!(tail.entry_count, MEMBERS.len() as u64);

    let entries = index.read_central_directory().await.unwrap();
    assert_eq!(entries.len(), MEMBERS.len());
    for ((entry, member), header_offset) in entries.iter().zip(MEMBERS).zip(&header_offsets) {
        assert_eq!(entry.file_name_raw, member.name);
        assert_eq!(entry.compressed_size, member.data.len() as u64);
        assert_eq!(entry.uncompressed_size, member.data.len() as u64);
        assert_eq!(entry.local_header_offset, *header_offset);
        assert_eq!(entry.compression_method, CompressionMethod::Stored);
    }
}

#[tokio::test]
async fn payload_offsets_locate_member_bytes() {
    let (archive, _) = build_archive();
    let bytes = archive.clone();
    let index = ZipIndexReader::new(Arc::new(SliceReader(archive)));

    let entries = index.read_central_directory().await.unwrap();
    for (entry, member) in entries.iter().zip(MEMBERS) {
        let payload_offset = index.payload_offset(entry).await.unwrap() as usize;
        assert_eq!(
            &bytes[payload_offset..payload_offset + member.data.len()],
            member.data
        );
    }
}

#[tokio::test]
async fn packed_members_plan_to_one_range() {
    let (archive, header_offsets) = build_archive();
    let archive_len = archive.len() as u64;
    let index = ZipIndexReader::new(Arc::new(SliceReader(archive)));

    let mut entries = index.read_central_directory().await.unwrap();
    entries.sort_by_key(|entry| entry.local_header_offset);

    let groups = plan_merged_ranges(&entries);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].entries.len(), MEMBERS.len());
    assert_eq!(groups[0].start_offset, header_offsets[0]);
    // The estimated range must cover the last member's payload.
    assert!(groups[0].end_offset >= archive_len);
}

#[tokio::test]
async fn local_file_reader_reads_the_same_index() {
    let (archive, _) = build_archive();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packed.zip");
    std::fs::write(&path, &archive).unwrap();

    let from_memory = ZipIndexReader::new(Arc::new(SliceReader(archive)))
        .read_central_directory()
        .await
        .unwrap();
    let from_file = ZipIndexReader::new(Arc::new(LocalFileReader::open(&path).unwrap()))
        .read_central_directory()
        .await
        .unwrap();

    assert_eq!(from_memory, from_file);
}

#[tokio::test]
async fn zip64_sizes_resolve_through_the_extra_field() {
    // One stored member whose directory record saturates the
    // uncompressed size and carries the real value in a ZIP64 extra
    // field. Payload bytes are irrelevant here; only metadata is read.
    let mut archive = Vec::new();
    push_local_header(&mut archive, b"big.img", 5);
    archive.extend_from_slice(b"stub!");

    let directory_offset = archive.len();
    let mut extra = Vec::new();
    extra.extend_from_slice(&0x0001u16.to_le_bytes());
    extra.extend_from_slice(&8u16.to_le_bytes());
    extra.extend_from_slice(&6_442_450_944u64.to_le_bytes());
    push_directory_record(&mut archive, b"big.img", 5, u32::MAX, 0, &extra);
    let directory_size = archive.len() - directory_offset;

    push_end_record(&mut archive, 1, directory_size as u32, directory_offset as u32);

    let index = ZipIndexReader::new(Arc::new(SliceReader(archive)));
    let entries = index.read_central_directory().await.unwrap();
    assert_eq!(entries[0].uncompressed_size, 6_442_450_944);
    assert_eq!(entries[0].compressed_size, 5);
}

#[tokio::test]
async fn garbage_bytes_report_a_corrupt_archive() {
    let index = ZipIndexReader::new(Arc::new(SliceReader(vec![0x42u8; 2000])));

    let err = index.archive_tail().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<FormatError>(),
        Some(&FormatError::CorruptArchive)
    );
}
