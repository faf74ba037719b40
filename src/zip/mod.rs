//! ZIP archive metadata reading and download-range planning.
//!
//! The pipeline runs end-first:
//!
//! 1. [`parser::parse_archive_tail`] locates the end-of-central-directory
//!    record (ZIP64-aware) inside the archive's trailing bytes
//! 2. [`parser::parse_central_directory_entry`] walks the directory one
//!    exact-sized record at a time
//! 3. [`planner::plan_merged_ranges`] folds the entries into the byte
//!    ranges worth fetching in one request each
//! 4. [`parser::parse_local_header`] pins down the payload start inside
//!    a fetched range
//!
//! [`ZipIndexReader`] drives steps 1, 2, and 4 over a [`ReadAt`] source;
//! the planning step is pure. Nothing in this module downloads payloads
//! or decompresses them, and nothing writes archives.
//!
//! [`ReadAt`]: crate::io::ReadAt

mod parser;
mod planner;
mod structures;

pub use parser::{
    ZipIndexReader, parse_archive_tail, parse_central_directory_entry, parse_local_header,
};
pub use planner::{
    LOCAL_HEADER_SIZE_ESTIMATE, MergeTolerances, MergedRangeGroup, plan_merged_ranges,
    plan_merged_ranges_with,
};
pub use structures::{ArchiveTail, CentralDirectoryEntry, CompressionMethod, LocalHeaderInfo};
