//! Structural parse errors.
//!
//! Every variant is terminal for the parse or plan call that raised it:
//! a structurally corrupt archive will not parse differently on a second
//! attempt, so retry policy (if any) belongs to the I/O layer above.

use thiserror::Error;

/// Errors raised while decoding ZIP metadata records.
///
/// I/O failures from the underlying byte source are not represented here;
/// they surface as `anyhow` errors from the async reading layer. This enum
/// covers only what the bytes themselves can get wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// No end-of-central-directory signature within the lookback window.
    /// The input is not a ZIP archive, or its comment exceeds the legal
    /// maximum and pushed the end record out of reach.
    #[error("no end of central directory record found; not a ZIP archive")]
    CorruptArchive,

    /// The classic end record carries a ZIP64 sentinel, but no ZIP64 end
    /// record was found in the lookback window.
    #[error("archive requires ZIP64 but the ZIP64 end of central directory record is missing")]
    Zip64RecordMissing,

    /// The central directory lies beyond the signed 32-bit range and ZIP64
    /// support was not requested. Refusing beats silent truncation.
    #[error("central directory offset exceeds 32-bit range and ZIP64 support is disabled")]
    UnsupportedLargeArchive,

    /// Bad signature or truncated record where a central directory entry
    /// was expected.
    #[error("invalid central directory entry at offset {offset}")]
    CorruptCentralDirectoryEntry { offset: u64 },

    /// An entry field is saturated, but the ZIP64 extended-information
    /// extra field that must carry the real value is absent or truncated.
    #[error("entry {file_name:?} is missing a required ZIP64 extra field")]
    Zip64ExtraFieldMissing { file_name: String },

    /// Bad signature or truncated buffer where a local file header was
    /// expected.
    #[error("invalid local file header")]
    CorruptLocalHeader,
}
