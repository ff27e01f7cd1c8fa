//! Word token rules shared by indexing and matching
//!
//! Token characters are ASCII letters and digits plus every non-ASCII
//! character that is not whitespace, a control character, or punctuation.
//! Every separator here is also a separator for the FTS5 `unicode61`
//! tokenizer, so a whole-word occurrence always starts and ends on tokenizer
//! boundaries. Hebrew points and cantillation marks are token characters, and
//! `"בית"` is not a whole word inside `"הבית"`.

use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{P}$").expect("punctuation class is a valid pattern"));

/// Separator run used between tokens when punctuation is ignored
pub const PUNCT_GAP: &str = r"[\p{P}\s]+";

/// Whether `c` is part of a word token
pub fn is_token_char(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_alphanumeric();
    }
    if c.is_whitespace() || c.is_control() {
        return false;
    }
    let mut buf = [0u8; 4];
    !PUNCTUATION.is_match(c.encode_utf8(&mut buf))
}

/// Split text into its word tokens
pub fn word_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !is_token_char(c))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether the byte range `start..end` of `text` is delimited on both sides
/// by a non-token character or an edge of the text
pub fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.map_or(true, |c| !is_token_char(c)) && after.map_or(true, |c| !is_token_char(c))
}

/// Regex source that matches `tokens` in order with any run of punctuation
/// or whitespace between them
pub fn punct_insensitive_pattern(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join(PUNCT_GAP)
}

/// Quote a string as a single FTS5 phrase
pub fn fts_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}
