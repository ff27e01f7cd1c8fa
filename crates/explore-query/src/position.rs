//! Classification of a match against the segment that owns it

use explore_core::text::is_token_char;
use explore_core::{byte_index, HitPosition, Segment};

/// Positions of the match `char_start..char_end` within `segment`
///
/// `Start` when nothing but non-token characters precede the match in the
/// segment, `End` when the match ends inside the segment with nothing but
/// non-token characters after it, `Cross` when it runs past the segment's
/// end.
pub fn classify_position(segment: &Segment, char_start: usize, char_end: usize) -> Vec<HitPosition> {
    let mut positions = Vec::new();
    let seg_end = segment.char_end();
    let rel_start = char_start.saturating_sub(segment.char_offset);

    let before = &segment.text[..byte_index(&segment.text, rel_start)];
    if !before.chars().any(is_token_char) {
        positions.push(HitPosition::Start);
    }

    if char_end > seg_end {
        positions.push(HitPosition::Cross);
    } else {
        let rel_end = char_end.saturating_sub(segment.char_offset);
        let after = &segment.text[byte_index(&segment.text, rel_end)..];
        if !after.chars().any(is_token_char) {
            positions.push(HitPosition::End);
        }
    }

    positions
}

/// Whether the match passes a position filter (an empty filter passes all)
pub fn position_allowed(filter: &[HitPosition], segment: &Segment, char_start: usize, char_end: usize) -> bool {
    filter.is_empty()
        || classify_position(segment, char_start, char_end)
            .iter()
            .any(|p| filter.contains(p))
}
