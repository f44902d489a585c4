//! Bibliography extraction.
//!
//! Parses the numbered entries of a document's bibliography section into a
//! [`ReferenceTable`]. Entry numbers come in several encodings, because the
//! PDF-to-markdown step renders them inconsistently:
//!
//! - `## 7. Text` (single-digit heading)
//! - `## 1 2. Text` (multi-digit heading with spaces between the digits)
//! - `## 66. Text` (contiguous multi-digit heading)
//! - `56. Text` or `9 1. Text` (standalone line, no heading marker)
//!
//! Encodings are applied in that priority order; within one encoding the
//! document order decides. A number already in the table is never replaced.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::document::{heading_title, lines_with_offsets, Document};
use crate::options::ResolveOptions;

static HEADING_ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<num>\d[^.]*?)\.(?:\s+(?P<text>.*))?$")
        .expect("Invalid heading entry regex pattern")
});
static STANDALONE_ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<num>\d+(?:[ \t]+\d+)*)\.[ \t]+(?P<text>\S.*)$")
        .expect("Invalid standalone entry regex pattern")
});
static AUTHOR_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\p{L}[\p{L}'’\-]+)").expect("Invalid author token regex pattern")
});
static PAREN_YEAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d{4})[a-z]?\)").expect("Invalid parenthesized year regex pattern")
});
static BARE_YEAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("Invalid bare year regex pattern")
});

/// How an entry's number was written in the source.
///
/// The declaration order is the parsing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberEncoding {
    SingleDigitHeading,
    SpacedMultiDigitHeading,
    ContiguousMultiDigitHeading,
    Standalone,
}

/// One numbered bibliography item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub number: u32,
    pub text: String,
    pub encoding: NumberEncoding,
}

impl ReferenceEntry {
    /// The leading author token, e.g. `Smith` in `Smith, J. (2020) ...`.
    pub fn first_author(&self) -> Option<&str> {
        AUTHOR_TOKEN_REGEX
            .captures(&self.text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())
    }

    /// The publication year, preferring a parenthesized `(2020)` form.
    pub fn year(&self) -> Option<&str> {
        PAREN_YEAR_REGEX
            .captures(&self.text)
            .or_else(|| BARE_YEAR_REGEX.captures(&self.text))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())
    }
}

/// Reference entries keyed by number, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    entries: BTreeMap<u32, ReferenceEntry>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` unless its number is taken. Returns whether it was kept.
    pub fn insert(&mut self, entry: ReferenceEntry) -> bool {
        match self.entries.entry(entry.number) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, number: u32) -> Option<&ReferenceEntry> {
        self.entries.get(&number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.values()
    }

    pub fn numbers(&self) -> BTreeSet<u32> {
        self.entries.keys().copied().collect()
    }

    /// Numbers absent from `1..=max`, where `max` is the largest number.
    pub fn missing_numbers(&self) -> Vec<u32> {
        match self.entries.keys().next_back() {
            Some(&max) => (1..=max).filter(|n| !self.contains(*n)).collect(),
            None => Vec::new(),
        }
    }
}

/// Result of parsing a bibliography: the table plus what went wrong.
#[derive(Debug, Clone, Default)]
pub struct ParsedReferences {
    pub table: ReferenceTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// A number token as written: `12` or `1 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberToken {
    Contiguous { value: u32, digits: usize },
    Spaced { value: u32 },
}

impl NumberToken {
    pub(crate) fn value(self) -> u32 {
        match self {
            NumberToken::Contiguous { value, .. } | NumberToken::Spaced { value } => value,
        }
    }
}

/// Reads a number token, rejecting anything that is not entirely digits
/// (optionally separated by whitespace).
pub(crate) fn parse_number_token(token: &str) -> Result<NumberToken, &'static str> {
    let token = token.trim();
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        let value = token.parse().map_err(|_| "number too large")?;
        return Ok(NumberToken::Contiguous {
            value,
            digits: token.len(),
        });
    }

    let parts: Vec<&str> = token.split_whitespace().collect();
    if parts.len() < 2 || !parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())) {
        return Err("not a number");
    }
    let joined = parts.concat();
    if joined.starts_with('0') {
        return Err("spaced number with a leading zero");
    }
    let value = joined.parse().map_err(|_| "number too large")?;
    Ok(NumberToken::Spaced { value })
}

/// A classified bibliography line.
enum Line<'a> {
    Blank,
    /// An entry heading with a usable number.
    HeadingEntry {
        number: u32,
        encoding: NumberEncoding,
        text: &'a str,
    },
    /// A heading that could not be read as an entry.
    RejectedHeading { reason: &'static str },
    Standalone { number: u32, text: &'a str },
    /// A standalone-looking line refused by configuration.
    RejectedStandalone { reason: &'static str },
    Text(&'a str),
}

fn classify_line<'a>(line: &'a str, options: &ResolveOptions) -> Line<'a> {
    if line.trim().is_empty() {
        return Line::Blank;
    }

    if let Some(title) = heading_title(line) {
        let Some(cap) = HEADING_ENTRY_REGEX.captures(title) else {
            return Line::RejectedHeading {
                reason: "heading is not of the form '<number>. <text>'",
            };
        };
        let text = cap.name("text").map_or("", |m| m.as_str());
        let token = match parse_number_token(&cap["num"]) {
            Ok(token) => token,
            Err(reason) => return Line::RejectedHeading { reason },
        };
        let encoding = match token {
            NumberToken::Contiguous { digits: 1, .. } => NumberEncoding::SingleDigitHeading,
            NumberToken::Contiguous { .. } => NumberEncoding::ContiguousMultiDigitHeading,
            NumberToken::Spaced { .. } if options.spaced_digits => {
                NumberEncoding::SpacedMultiDigitHeading
            }
            NumberToken::Spaced { .. } => {
                return Line::RejectedHeading {
                    reason: "spaced-digit reconstruction is disabled",
                }
            }
        };
        let number = token.value();
        if number == 0 || number > options.max_reference_number {
            return Line::RejectedHeading {
                reason: "number out of range",
            };
        }
        return Line::HeadingEntry {
            number,
            encoding,
            text,
        };
    }

    if let Some(cap) = STANDALONE_ENTRY_REGEX.captures(line) {
        let text = cap.name("text").map_or("", |m| m.as_str());
        // Years and page numbers at the start of a wrapped line are continuation text.
        match parse_number_token(&cap["num"]) {
            Ok(token) if token.value() == 0 || token.value() > options.max_reference_number => {}
            Ok(NumberToken::Spaced { .. }) if !options.spaced_digits => {
                return Line::RejectedStandalone {
                    reason: "spaced-digit reconstruction is disabled",
                }
            }
            Ok(token) => {
                return Line::Standalone {
                    number: token.value(),
                    text,
                }
            }
            Err(_) => {}
        }
    }

    Line::Text(line)
}

/// An entry being assembled from its marker line and continuation lines.
struct Block<'a> {
    line: usize,
    number: u32,
    encoding: NumberEncoding,
    /// Marker-line text followed by continuation lines; `None` is a blank line.
    parts: Vec<Option<&'a str>>,
}

impl Block<'_> {
    fn text(&self, first_logical_line_only: bool) -> String {
        let mut words: Vec<&str> = Vec::new();
        for part in &self.parts {
            match part {
                Some(line) => words.extend(line.split_whitespace()),
                None if first_logical_line_only && !words.is_empty() => break,
                None => {}
            }
        }
        words.join(" ")
    }
}

/// Truncates `text` to `max_chars` characters, appending `...` if cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}...", text[..cut].trim_end()), true),
        None => (text.to_string(), false),
    }
}

/// Extracts the reference table from a parsed document.
///
/// Never fails: a missing section yields an empty table and a
/// `MissingSection` diagnostic; unreadable entries are skipped with a
/// `MalformedEntry` diagnostic.
///
/// # Examples
///
/// ```
/// use citemap::{parse_references, Document, ResolveOptions};
///
/// let options = ResolveOptions::default();
/// let doc = Document::parse("Text [1].\n\n## References\n\n## 1. Smith (2020) A\n", &options).unwrap();
/// let parsed = parse_references(&doc, &options);
/// assert_eq!(parsed.table.get(1).unwrap().text, "Smith (2020) A");
/// ```
pub fn parse_references(document: &Document, options: &ResolveOptions) -> ParsedReferences {
    let mut parsed = ParsedReferences::default();

    let (Some(section), Some(body)) = (document.bibliography(), document.bibliography_body()) else {
        parsed.diagnostics.push(Diagnostic::MissingSection);
        return parsed;
    };

    let mut blocks: Vec<Block> = Vec::new();
    let mut open = false;

    for (index, (_, line)) in lines_with_offsets(body).enumerate() {
        let line_no = section.body_line + index;
        match classify_line(line, options) {
            Line::HeadingEntry {
                number,
                encoding,
                text,
            } => {
                blocks.push(Block {
                    line: line_no,
                    number,
                    encoding,
                    parts: vec![Some(text)],
                });
                open = true;
            }
            Line::Standalone { number, text } => {
                blocks.push(Block {
                    line: line_no,
                    number,
                    encoding: NumberEncoding::Standalone,
                    parts: vec![Some(text)],
                });
                open = true;
            }
            Line::RejectedHeading { reason } | Line::RejectedStandalone { reason } => {
                parsed.diagnostics.push(Diagnostic::MalformedEntry {
                    line: line_no,
                    text: line.trim().to_string(),
                    reason: reason.to_string(),
                });
                open = false;
            }
            Line::Text(text) if open => {
                if let Some(block) = blocks.last_mut() {
                    block.parts.push(Some(text));
                }
            }
            Line::Blank if open => {
                if let Some(block) = blocks.last_mut() {
                    block.parts.push(None);
                }
            }
            Line::Text(_) | Line::Blank => {}
        }
    }

    // With no explicit end boundary, text after the last entry's first
    // logical line is as likely to be an appendix as part of the entry.
    let last_block = blocks.len().checked_sub(1).filter(|_| !section.bounded);

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&i| (blocks[i].encoding, blocks[i].line));

    for i in order {
        let block = &blocks[i];
        let text = block.text(Some(i) == last_block);
        if text.is_empty() {
            parsed.diagnostics.push(Diagnostic::MalformedEntry {
                line: block.line,
                text: block.number.to_string(),
                reason: "empty reference text".to_string(),
            });
            continue;
        }
        if parsed.table.contains(block.number) {
            parsed.diagnostics.push(Diagnostic::DuplicateReference {
                number: block.number,
                line: block.line,
            });
            continue;
        }

        let (text, truncated) = truncate_chars(&text, options.max_reference_len);
        if truncated {
            parsed
                .diagnostics
                .push(Diagnostic::TruncatedEntry { number: block.number });
        }
        parsed.table.insert(ReferenceEntry {
            number: block.number,
            text,
            encoding: block.encoding,
        });
    }

    let missing = parsed.table.missing_numbers();
    if !missing.is_empty() {
        parsed.diagnostics.push(Diagnostic::NumberingGap { missing });
    }

    debug!(
        "Extracted {} references ({} diagnostics)",
        parsed.table.len(),
        parsed.diagnostics.len()
    );
    parsed
}
