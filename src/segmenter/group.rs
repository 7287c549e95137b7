//! Fixed-size grouping of consecutive caption lines.

use super::SegmentGroup;
use crate::transcript::TranscriptLine;

/// Partition lines into consecutive groups of at most `group_size`.
///
/// No line is dropped or reordered; the trailing group may be shorter.
/// A `group_size` of zero is treated as one.
pub fn group(lines: &[TranscriptLine], group_size: usize) -> Vec<SegmentGroup> {
    lines
        .chunks(group_size.max(1))
        .map(|window| SegmentGroup::new(window.to_vec()))
        .collect()
}
