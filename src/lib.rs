//! # ziprange
//!
//! Read ZIP archive metadata through ranged reads and plan the smallest
//! workable set of contiguous byte ranges that cover a chosen set of
//! members, so selected files can be pulled out of a multi-gigabyte
//! remote archive without downloading it in full.
//!
//! ## What it does
//!
//! - Locates and parses the end-of-central-directory record from the
//!   archive's trailing bytes, including the ZIP64 variant
//! - Walks the central directory into immutable per-member entries,
//!   resolving ZIP64 extra-field overrides for saturated fields
//! - Parses local file headers to compute exact payload offsets
//! - Partitions offset-sorted entries into merged download ranges,
//!   tolerating gaps that are either absolutely small or a cheap share
//!   of the range they extend
//!
//! Transport is behind the [`ReadAt`] trait; [`LocalFileReader`] is the
//! bundled file-backed implementation. Fetching planned ranges over a
//! network and decompressing member payloads are left to the caller.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use ziprange::{LocalFileReader, ZipIndexReader, plan_merged_ranges};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::open(Path::new("archive.zip"))?);
//!     let index = ZipIndexReader::new(reader);
//!
//!     let mut entries = index.read_central_directory().await?;
//!     entries.sort_by_key(|entry| entry.local_header_offset);
//!
//!     for group in plan_merged_ranges(&entries) {
//!         println!(
//!             "fetch bytes {}..{} covering {} members",
//!             group.start_offset,
//!             group.end_offset,
//!             group.entries.len()
//!         );
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod io;
pub mod zip;

pub use error::FormatError;
pub use io::{LocalFileReader, ReadAt};
pub use zip::{
    ArchiveTail, CentralDirectoryEntry, CompressionMethod, LOCAL_HEADER_SIZE_ESTIMATE,
    LocalHeaderInfo, MergeTolerances, MergedRangeGroup, ZipIndexReader, parse_archive_tail,
    parse_central_directory_entry, parse_local_header, plan_merged_ranges,
    plan_merged_ranges_with,
};
