//! Query plans
//!
//! A plan is built once per request. It decides which full-text table (if
//! any) narrows the candidate documents, and how a candidate's text is
//! verified. Narrowing only ever over-approximates: every document holding a
//! verified match is a candidate.

use explore_core::text::{fts_phrase, is_word_bounded, punct_insensitive_pattern, word_tokens};
use explore_core::{ConfigError, SearchMode};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::QueryError;
use crate::results::SearchOptions;

/// Shortest fragment the trigram index can look up
const MIN_TRIGRAM_CHARS: usize = 3;

// Characters the word tokenizer keeps; anything else is a separator to it
static FTS_TOKEN_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}\p{Co}]").expect("token class is a valid pattern"));

/// Candidate selection for a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrowing {
    /// Every document is a candidate
    Scan,
    /// `documents_fts MATCH` expression
    Words(String),
    /// `documents_trigram MATCH` expression
    Trigrams(String),
}

impl Narrowing {
    /// Full-text table and MATCH expression, or `None` for a scan
    pub fn table(&self) -> Option<(&'static str, &str)> {
        match self {
            Narrowing::Scan => None,
            Narrowing::Words(expr) => Some(("documents_fts", expr)),
            Narrowing::Trigrams(expr) => Some(("documents_trigram", expr)),
        }
    }
}

/// A literal query, optionally with punctuation-insensitive gaps
#[derive(Debug, Clone)]
pub enum Needle {
    Literal(String),
    Gapped(Regex),
}

impl Needle {
    /// Every occurrence as byte ranges, overlapping ones included
    fn occurrences(&self, text: &str) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        let mut from = 0;
        while from < text.len() {
            let next = match self {
                Needle::Literal(needle) => text[from..]
                    .find(needle.as_str())
                    .map(|i| (from + i, from + i + needle.len())),
                Needle::Gapped(re) => re.find_at(text, from).map(|m| (m.start(), m.end())),
            };
            let Some((start, end)) = next else {
                break;
            };
            if end > start {
                found.push((start, end));
            }
            from = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        found
    }
}

/// How one request finds its matches
#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// Whole-word occurrences
    Exact { needle: Needle, narrowing: Narrowing },
    /// Substring occurrences, mid-word included
    Partial { needle: Needle, narrowing: Narrowing },
    /// Non-empty matches of a regular expression
    Regex { regex: Regex, narrowing: Narrowing },
}

impl QueryPlan {
    pub fn new(query: &str, mode: SearchMode, options: &SearchOptions) -> Result<Self, QueryError> {
        if query.trim().is_empty() {
            return Err(ConfigError::EmptyQuery.into());
        }

        match mode {
            SearchMode::Exact => Ok(Self::exact(query.trim(), options.ignore_punct)),
            SearchMode::Partial => Ok(Self::partial(query.trim(), options.ignore_punct)),
            SearchMode::Regex => Self::regex(query),
        }
    }

    fn exact(query: &str, ignore_punct: bool) -> Self {
        let tokens = word_tokens(query);
        let narrowing = if tokens.iter().any(|t| FTS_TOKEN_CHAR.is_match(t)) {
            Narrowing::Words(fts_phrase(&tokens.join(" ")))
        } else {
            Narrowing::Scan
        };
        QueryPlan::Exact {
            needle: needle(query, &tokens, ignore_punct),
            narrowing,
        }
    }

    fn partial(query: &str, ignore_punct: bool) -> Self {
        let tokens = word_tokens(query);
        let needle = needle(query, &tokens, ignore_punct);
        let fragments: Vec<&str> = match needle {
            Needle::Literal(_) => vec![query],
            Needle::Gapped(_) => tokens,
        };
        QueryPlan::Partial {
            needle,
            narrowing: trigram_narrowing(fragments),
        }
    }

    fn regex(pattern: &str) -> Result<Self, QueryError> {
        let regex = Regex::new(pattern).map_err(|e| QueryError::invalid_pattern(pattern, e))?;
        let literals = required_literals(pattern);
        Ok(QueryPlan::Regex {
            regex,
            narrowing: trigram_narrowing(literals.iter().map(String::as_str)),
        })
    }

    pub fn mode(&self) -> SearchMode {
        match self {
            QueryPlan::Exact { .. } => SearchMode::Exact,
            QueryPlan::Partial { .. } => SearchMode::Partial,
            QueryPlan::Regex { .. } => SearchMode::Regex,
        }
    }

    pub fn narrowing(&self) -> &Narrowing {
        match self {
            QueryPlan::Exact { narrowing, .. }
            | QueryPlan::Partial { narrowing, .. }
            | QueryPlan::Regex { narrowing, .. } => narrowing,
        }
    }

    /// Verified matches in `text` as byte ranges, in ascending start order
    pub fn find_in(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            QueryPlan::Exact { needle, .. } => needle
                .occurrences(text)
                .into_iter()
                .filter(|&(start, end)| is_word_bounded(text, start, end))
                .collect(),
            QueryPlan::Partial { needle, .. } => needle.occurrences(text),
            QueryPlan::Regex { regex, .. } => regex
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

fn needle(query: &str, tokens: &[&str], ignore_punct: bool) -> Needle {
    if ignore_punct && !tokens.is_empty() {
        // Built only from escaped tokens and a fixed class
        if let Ok(re) = Regex::new(&punct_insensitive_pattern(tokens)) {
            return Needle::Gapped(re);
        }
    }
    Needle::Literal(query.to_string())
}

fn trigram_narrowing<'a, I>(fragments: I) -> Narrowing
where
    I: IntoIterator<Item = &'a str>,
{
    let phrases: Vec<String> = fragments
        .into_iter()
        .filter(|f| f.chars().count() >= MIN_TRIGRAM_CHARS)
        .map(fts_phrase)
        .collect();
    if phrases.is_empty() {
        Narrowing::Scan
    } else {
        Narrowing::Trigrams(phrases.join(" AND "))
    }
}

/// Literal fragments that every match of `pattern` contains
///
/// Conservative: alternation and inline flags yield nothing, and only runs of
/// plain characters outside groups and classes are collected. A character
/// made optional by `?`, `*` or `{` is dropped from its run.
pub fn required_literals(pattern: &str) -> Vec<String> {
    if pattern.contains('|') || pattern.contains("(?") {
        return Vec::new();
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut literals = Vec::new();
    let mut run = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => {
                let Some(&next) = chars.get(i) else {
                    break;
                };
                i += 1;
                if next == '<' || next == '>' {
                    // Word-start and word-end assertions
                    flush(&mut run, &mut literals);
                } else if next.is_ascii_punctuation() {
                    if depth == 0 {
                        run.push(next);
                    }
                } else {
                    flush(&mut run, &mut literals);
                    i = skip_escape_args(&chars, i, next);
                }
            }
            '[' => {
                flush(&mut run, &mut literals);
                i = skip_class(&chars, i);
            }
            '(' => {
                flush(&mut run, &mut literals);
                depth += 1;
            }
            ')' => {
                flush(&mut run, &mut literals);
                depth = depth.saturating_sub(1);
            }
            '?' | '*' | '{' => {
                run.pop();
                flush(&mut run, &mut literals);
                if c == '{' {
                    while i < chars.len() && chars[i] != '}' {
                        i += 1;
                    }
                    i += 1;
                }
                if chars.get(i) == Some(&'?') {
                    i += 1;
                }
            }
            '+' => {
                flush(&mut run, &mut literals);
                if chars.get(i) == Some(&'?') {
                    i += 1;
                }
            }
            '.' | '^' | '$' => flush(&mut run, &mut literals),
            _ if depth == 0 => run.push(c),
            _ => {}
        }
    }
    flush(&mut run, &mut literals);

    literals
}

fn flush(run: &mut String, literals: &mut Vec<String>) {
    if run.chars().count() >= MIN_TRIGRAM_CHARS {
        literals.push(run.clone());
    }
    run.clear();
}

/// Skip the arguments of an escape such as `\x41`, `\u{5D0}` or `\pL`
fn skip_escape_args(chars: &[char], i: usize, escape: char) -> usize {
    if chars.get(i) == Some(&'{') {
        return chars[i..]
            .iter()
            .position(|&c| c == '}')
            .map_or(chars.len(), |p| i + p + 1);
    }
    let fixed = match escape {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        'p' | 'P' => 1,
        _ => 0,
    };
    (i + fixed).min(chars.len())
}

/// Skip a (possibly nested) character class whose `[` was just consumed
fn skip_class(chars: &[char], mut i: usize) -> usize {
    if chars.get(i) == Some(&'^') {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    let mut depth = 1;
    while i < chars.len() && depth > 0 {
        match chars[i] {
            '\\' => i += 1,
            '[' => depth += 1,
            ']' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    i
}
