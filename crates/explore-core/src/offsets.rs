//! Character offset bookkeeping between segments and document text
//!
//! A document's full text is its segment texts joined by
//! [`SEGMENT_SEPARATOR`]. Segment `n` starts at
//! `char_offset[n] = char_offset[n-1] + chars(text[n-1]) + chars(separator)`.
//! All offsets count Unicode scalar values, never bytes.

use crate::types::Segment;

/// Separator placed between consecutive segment texts
pub const SEGMENT_SEPARATOR: &str = " ";

/// Join segment texts, returning the full text and the starting character
/// offset of every segment
pub fn join_segments<'a, I>(texts: I) -> (String, Vec<usize>)
where
    I: IntoIterator<Item = &'a str>,
{
    let separator_len = SEGMENT_SEPARATOR.chars().count();
    let mut full_text = String::new();
    let mut offsets = Vec::new();
    let mut cursor = 0usize;

    for (i, text) in texts.into_iter().enumerate() {
        if i > 0 {
            full_text.push_str(SEGMENT_SEPARATOR);
            cursor += separator_len;
        }
        offsets.push(cursor);
        full_text.push_str(text);
        cursor += text.chars().count();
    }

    (full_text, offsets)
}

/// Length in characters of the document the segments were cut from
pub fn document_length(segments: &[Segment]) -> usize {
    segments.last().map(Segment::char_end).unwrap_or(0)
}

/// Index of the segment containing `char_offset`
///
/// Resolves to the last segment whose `char_offset` is at or before the
/// offset, so a separator position belongs to the segment preceding it.
/// Returns `None` for an empty slice or an offset at or past the end of the
/// document. `segments` must be sorted by `char_offset`.
pub fn locate_segment(segments: &[Segment], char_offset: usize) -> Option<usize> {
    if char_offset >= document_length(segments) {
        return None;
    }
    segments
        .partition_point(|s| s.char_offset <= char_offset)
        .checked_sub(1)
}

/// Converts byte offsets of one text into character offsets
///
/// Lookups are cheapest when issued in non-decreasing byte order; a lookup
/// behind the cursor rescans from the start of the text.
pub struct CharCursor<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    /// Character offset of `byte`, which must lie on a char boundary
    pub fn char_offset(&mut self, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// Byte index of the character at `char_offset`, or the text length when the
/// offset is at or past the end
pub fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
