//! Grouping of archive members into contiguous download ranges.
//!
//! Fetching each selected member with its own ranged read wastes a round
//! trip per member; fetching the whole archive wastes bandwidth. The
//! planner sits between: one left-to-right pass over the offset-sorted
//! entries folds neighbours into a shared range as long as the bytes
//! skipped between them stay cheap, and cuts a new range when a gap is
//! both absolutely large and a disproportionate share of the span it
//! would create.
//!
//! The pass is greedy and never backtracks, so the group count is locally
//! reasonable rather than provably minimal. Archive layout is roughly
//! contiguous by directory in practice, which is what the heuristic
//! tracks.

use super::structures::{CentralDirectoryEntry, LOCAL_HEADER_FIXED_SIZE};

/// Conservative span of a member's local header: the 30-byte fixed part
/// plus an allowance for its file name and extra field, used before the
/// real header has been read.
pub const LOCAL_HEADER_SIZE_ESTIMATE: u64 = LOCAL_HEADER_FIXED_SIZE as u64 + 256;

/// Split thresholds for the range planner. A gap forces a new group only
/// when it exceeds **both** limits: a huge gap inside an already huge
/// span is tolerated, and so is a small gap that dominates a tiny span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeTolerances {
    /// Gap size in bytes above which a split becomes possible.
    pub max_gap_bytes: u64,
    /// Share of the candidate group span that skipped bytes may occupy,
    /// counting every gap accumulated since the group started.
    pub max_gap_fraction: f64,
}

impl Default for MergeTolerances {
    fn default() -> Self {
        Self {
            max_gap_bytes: 4096,
            max_gap_fraction: 0.15,
        }
    }
}

/// One contiguous byte range covering a run of members.
///
/// `start_offset..end_offset` is the range to fetch; it spans every held
/// entry's local header (estimated) and compressed payload. Entries are
/// borrowed from the planner's input and stay in offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRangeGroup<'a> {
    pub entries: Vec<&'a CentralDirectoryEntry>,
    pub start_offset: u64,
    pub end_offset: u64,
}

impl MergedRangeGroup<'_> {
    /// Size of the ranged read this group asks for.
    pub fn byte_len(&self) -> u64 {
        self.end_offset - self.start_offset
    }
}

/// Partition `entries` into merged download ranges using the default
/// tolerances.
///
/// `entries` must already be sorted by `local_header_offset`; passing an
/// unsorted slice is a caller bug and panics. An empty slice yields an
/// empty plan, and the input is never mutated or cloned.
pub fn plan_merged_ranges(entries: &[CentralDirectoryEntry]) -> Vec<MergedRangeGroup<'_>> {
    plan_merged_ranges_with(entries, MergeTolerances::default())
}

/// Partition `entries` into merged download ranges with explicit
/// tolerances. See [`plan_merged_ranges`].
pub fn plan_merged_ranges_with(
    entries: &[CentralDirectoryEntry],
    tolerances: MergeTolerances,
) -> Vec<MergedRangeGroup<'_>> {
    assert!(
        entries
            .windows(2)
            .all(|pair| pair[0].local_header_offset <= pair[1].local_header_offset),
        "entries must be sorted by local_header_offset"
    );

    let mut groups = Vec::new();
    let mut iter = entries.iter();
    let Some(first) = iter.next() else {
        return groups;
    };

    let mut current = GroupAccumulator::start(first);
    for entry in iter {
        // Overlapping or touching spans count as a zero gap.
        let gap = entry.local_header_offset.saturating_sub(current.end_offset);
        let candidate_span =
            entry_span_end(entry) - current.start_offset;
        let gap_fraction = (current.cumulative_gap + gap) as f64 / candidate_span as f64;

        if gap > tolerances.max_gap_bytes && gap_fraction > tolerances.max_gap_fraction {
            groups.push(current.finish());
            current = GroupAccumulator::start(entry);
        } else {
            current.push(entry, gap);
        }
    }
    groups.push(current.finish());

    groups
}

/// Estimated end of the bytes a member occupies: local header plus
/// compressed payload.
fn entry_span_end(entry: &CentralDirectoryEntry) -> u64 {
    entry.local_header_offset + LOCAL_HEADER_SIZE_ESTIMATE + entry.compressed_size
}

/// Running state of the group being built, folded over the sorted
/// entries.
struct GroupAccumulator<'a> {
    entries: Vec<&'a CentralDirectoryEntry>,
    start_offset: u64,
    end_offset: u64,
    cumulative_gap: u64,
}

impl<'a> GroupAccumulator<'a> {
    fn start(entry: &'a CentralDirectoryEntry) -> Self {
        Self {
            entries: vec![entry],
            start_offset: entry.local_header_offset,
            end_offset: entry_span_end(entry),
            cumulative_gap: 0,
        }
    }

    fn push(&mut self, entry: &'a CentralDirectoryEntry, gap: u64) {
        self.cumulative_gap += gap;
        self.end_offset = self.end_offset.max(entry_span_end(entry));
        self.entries.push(entry);
    }

    fn finish(self) -> MergedRangeGroup<'a> {
        MergedRangeGroup {
            entries: self.entries,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
        }
    }
}
