//! In-text citation locator.
//!
//! Scans the body paragraphs of a document for numeric citation markers:
//! `[7]`, `[3, 7, 9]`, `[5-9]` / `[5–9]`, the spaced form `[ 1 2 ]`, and
//! author-year text adjacent to a bracket marker (`Smith et al. (2020) [4]`).
//!
//! Each [`Matcher`] is a closed strategy; all of them run over every
//! paragraph in a fixed order and every hit is kept. Overlapping hits are
//! collapsed later by the aggregator.

use std::collections::BTreeSet;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::document::{Document, Paragraph};
use crate::options::{ContextMode, ResolveOptions};
use crate::refs::{parse_number_token, truncate_chars, NumberToken, ReferenceEntry, ReferenceTable};

/// Author token to year, and year to marker, may be at most this far apart.
const AUTHOR_YEAR_WINDOW: usize = 200;

static BRACKET_SINGLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(\d+)\s*\]").expect("Invalid single bracket regex pattern")
});
static BRACKET_LIST_REGEX: Lazy<Regex> = Lazy::new(|| {
    let element = r"\d+(?:[ \t]+\d+)*(?:\s*[-–—]\s*\d+(?:[ \t]+\d+)*)?";
    Regex::new(&format!(r"\[\s*({e}(?:\s*[,;]\s*{e})+)\s*\]", e = element))
        .expect("Invalid bracket list regex pattern")
});
static BRACKET_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(\d+(?:[ \t]+\d+)*)\s*[-–—]\s*(\d+(?:[ \t]+\d+)*)\s*\]")
        .expect("Invalid bracket range regex pattern")
});
static SPACED_DIGITS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(\d(?:[ \t]+\d)+)\s*\]").expect("Invalid spaced digits regex pattern")
});
static RANGE_SEPARATOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–—]\s*").expect("Invalid range separator regex pattern"));

/// The strategy that produced an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// `[n]`
    BracketSingle,
    /// `[n1, n2, ...]`, also the fallback reading of ambiguous spaced digits.
    BracketList,
    /// `[n1-n2]`, expanded and capped.
    BracketRange,
    /// `[ d1 d2 ]` read as one multi-digit number.
    SpacedDigits,
    /// Author and year of a reference next to its bracket marker.
    AuthorYearAdjacent,
}

impl Matcher {
    /// All matchers, in the order they run over each paragraph.
    pub const ALL: [Matcher; 5] = [
        Matcher::BracketSingle,
        Matcher::BracketList,
        Matcher::BracketRange,
        Matcher::SpacedDigits,
        Matcher::AuthorYearAdjacent,
    ];
}

/// One detected citation marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationOccurrence {
    /// Reference numbers the marker points at; never empty.
    pub referenced_numbers: BTreeSet<u32>,
    pub matched_text: String,
    pub matcher: Matcher,
    /// Character offset of the bracket marker in the document.
    pub position: usize,
    /// Start and end byte positions of the matched text in the document.
    pub span: (usize, usize),
    pub paragraph_index: usize,
    pub context: String,
}

/// Raw locator output, before deduplication.
#[derive(Debug, Clone, Default)]
pub struct LocatedCitations {
    pub occurrences: Vec<CitationOccurrence>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A compiled author-year matcher for one reference.
#[derive(Debug)]
struct AuthorYearPattern {
    number: u32,
    regex: Regex,
}

/// Builds the author-year pattern for `entry`.
///
/// Author and year come from bibliography text, so they are escaped before
/// being embedded. Returns the reason when the entry lacks either token.
fn author_year_pattern(entry: &ReferenceEntry, spaced_digits: bool) -> Result<Regex, String> {
    let author = entry
        .first_author()
        .ok_or_else(|| "no leading author token".to_string())?;
    let year = entry
        .year()
        .ok_or_else(|| "no four-digit year".to_string())?;

    // Years and numbers may carry spurious spaces between digits.
    let year_pattern = digits_pattern(year, r"\s?");
    let number = entry.number.to_string();
    let number_pattern = if spaced_digits && number.len() > 1 {
        digits_pattern(&number, r"\s*")
    } else {
        number
    };

    let pattern = format!(
        r"(?i)\b{author}\b[^\[\]]{{0,{window}}}?\b{year}\b[^\[\]]{{0,{window}}}?(?P<marker>\[\s*{number}\s*\])",
        author = regex::escape(author),
        year = year_pattern,
        number = number_pattern,
        window = AUTHOR_YEAR_WINDOW,
    );
    Regex::new(&pattern).map_err(|e| e.to_string())
}

fn digits_pattern(digits: &str, separator: &str) -> String {
    let parts: Vec<String> = digits.chars().map(|c| regex::escape(&c.to_string())).collect();
    parts.join(separator)
}

/// Collapses runs of whitespace into single spaces.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Scanner<'a> {
    document: &'a Document,
    references: &'a ReferenceTable,
    options: &'a ResolveOptions,
    author_year: Vec<AuthorYearPattern>,
    diagnostics: Vec<Diagnostic>,
}

/// Byte-level match data for one marker inside a paragraph.
struct Hit<'t> {
    start: usize,
    end: usize,
    /// Byte offset of the bracket marker, which may follow the match start.
    marker: usize,
    text: &'t str,
}

impl<'a> Scanner<'a> {
    fn new(
        document: &'a Document,
        references: &'a ReferenceTable,
        options: &'a ResolveOptions,
    ) -> Self {
        let mut diagnostics = Vec::new();
        let mut author_year = Vec::new();

        if options.author_year {
            for entry in references.iter() {
                match author_year_pattern(entry, options.spaced_digits) {
                    Ok(regex) => author_year.push(AuthorYearPattern {
                        number: entry.number,
                        regex,
                    }),
                    Err(reason) => diagnostics.push(Diagnostic::PatternConstruction {
                        number: entry.number,
                        reason,
                    }),
                }
            }
        }

        Self {
            document,
            references,
            options,
            author_year,
            diagnostics,
        }
    }

    fn scan(mut self) -> LocatedCitations {
        let document = self.document;
        let mut occurrences = Vec::new();

        for paragraph in document.paragraphs() {
            let text = document.paragraph_text(paragraph);
            if !text.contains('[') {
                continue;
            }
            let paragraph_context = match self.options.context_mode {
                ContextMode::Paragraph => Some(self.paragraph_context(text)),
                ContextMode::Window => None,
            };

            for matcher in Matcher::ALL {
                let found = self.run(matcher, paragraph, text);
                for (hit, numbers, matcher) in found {
                    let context = match &paragraph_context {
                        Some(context) => context.clone(),
                        None => self.window_context(text, &hit),
                    };
                    occurrences.push(CitationOccurrence {
                        referenced_numbers: numbers,
                        matched_text: hit.text.to_string(),
                        matcher,
                        position: char_position(paragraph, text, hit.marker),
                        span: (paragraph.span.start + hit.start, paragraph.span.start + hit.end),
                        paragraph_index: paragraph.index,
                        context,
                    });
                }
            }
        }

        debug!(
            "Located {} raw citation markers in {} paragraphs",
            occurrences.len(),
            document.paragraphs().len()
        );
        LocatedCitations {
            occurrences,
            diagnostics: self.diagnostics,
        }
    }

    /// Runs one matcher over a paragraph. Hits are ordered by marker position.
    fn run<'t>(
        &mut self,
        matcher: Matcher,
        paragraph: &Paragraph,
        text: &'t str,
    ) -> Vec<(Hit<'t>, BTreeSet<u32>, Matcher)> {
        let mut found = Vec::new();
        let at = |hit: &Hit| char_position(paragraph, text, hit.marker);

        match matcher {
            Matcher::BracketSingle => {
                for cap in BRACKET_SINGLE_REGEX.captures_iter(text) {
                    let hit = whole(&cap);
                    let numbers = match cap[1].parse::<u32>() {
                        Ok(n) => vec![n],
                        Err(_) => {
                            self.malformed(at(&hit), &hit, "number too large");
                            continue;
                        }
                    };
                    if let Some(set) = self.accept(at(&hit), &hit, numbers) {
                        found.push((hit, set, matcher));
                    }
                }
            }
            Matcher::BracketList => {
                for cap in BRACKET_LIST_REGEX.captures_iter(text) {
                    let hit = whole(&cap);
                    let mut numbers = Vec::new();
                    for element in cap[1].split([',', ';']) {
                        match self.read_element(element) {
                            Ok(mut read) => numbers.append(&mut read),
                            Err(reason) => self.malformed(at(&hit), &hit, &reason),
                        }
                    }
                    if let Some(set) = self.accept(at(&hit), &hit, numbers) {
                        found.push((hit, set, matcher));
                    }
                }
            }
            Matcher::BracketRange => {
                for cap in BRACKET_RANGE_REGEX.captures_iter(text) {
                    let hit = whole(&cap);
                    match self.expand_range(&cap[1], &cap[2]) {
                        Ok(numbers) => {
                            if let Some(set) = self.accept(at(&hit), &hit, numbers) {
                                found.push((hit, set, matcher));
                            }
                        }
                        Err(reason) => self.malformed(at(&hit), &hit, &reason),
                    }
                }
            }
            Matcher::SpacedDigits => {
                for cap in SPACED_DIGITS_REGEX.captures_iter(text) {
                    let hit = whole(&cap);
                    let (numbers, joined) = self.read_spaced(&cap[1]);
                    // The separate-digits reading is list semantics.
                    let matcher = if joined {
                        Matcher::SpacedDigits
                    } else {
                        Matcher::BracketList
                    };
                    if let Some(set) = self.accept(at(&hit), &hit, numbers) {
                        found.push((hit, set, matcher));
                    }
                }
            }
            Matcher::AuthorYearAdjacent => {
                for pattern in &self.author_year {
                    for cap in pattern.regex.captures_iter(text) {
                        let full = cap.get(0).expect("group 0 always participates");
                        let marker = cap.name("marker").map_or(full.start(), |m| m.start());
                        let hit = Hit {
                            start: full.start(),
                            end: full.end(),
                            marker,
                            text: full.as_str(),
                        };
                        found.push((hit, BTreeSet::from([pattern.number]), matcher));
                    }
                }
                found.sort_by_key(|(hit, _, _)| hit.marker);
            }
        }

        found
    }

    /// Reads one list element: a number, a spaced number, or a range.
    fn read_element(&self, element: &str) -> Result<Vec<u32>, String> {
        let element = element.trim();
        if let Some((start, end)) = split_range(element) {
            return self.expand_range(start, end);
        }
        match parse_number_token(element) {
            Ok(NumberToken::Contiguous { value, .. }) => Ok(vec![value]),
            Ok(NumberToken::Spaced { .. }) => Ok(self.read_spaced(element).0),
            Err(reason) => Err(reason.to_string()),
        }
    }

    /// Reads `1 2` as 12 when reconstruction is on and reference 12 exists,
    /// otherwise as the separate numbers 1 and 2. The flag tells which.
    fn read_spaced(&self, token: &str) -> (Vec<u32>, bool) {
        if self.options.spaced_digits {
            if let Ok(NumberToken::Spaced { value }) = parse_number_token(token) {
                if self.references.contains(value) {
                    return (vec![value], true);
                }
            }
        }
        let separate = token
            .split_whitespace()
            .filter_map(|part| part.parse().ok())
            .collect();
        (separate, false)
    }

    fn read_endpoint(&self, token: &str) -> Result<u32, String> {
        match parse_number_token(token) {
            Ok(NumberToken::Contiguous { value, .. }) => Ok(value),
            Ok(NumberToken::Spaced { value }) if self.options.spaced_digits => Ok(value),
            Ok(NumberToken::Spaced { .. }) => {
                Err("spaced-digit reconstruction is disabled".to_string())
            }
            Err(reason) => Err(reason.to_string()),
        }
    }

    /// Expands an inclusive range to at most `range_cap` numbers from its start.
    fn expand_range(&self, start: &str, end: &str) -> Result<Vec<u32>, String> {
        let start = self.read_endpoint(start)?;
        let end = self.read_endpoint(end)?;
        if end < start {
            return Err(format!("reversed range {}-{}", start, end));
        }
        let cap = u32::try_from(self.options.range_cap).unwrap_or(u32::MAX);
        let last = end.min(start.saturating_add(cap.saturating_sub(1)));
        Ok((start..=last).collect())
    }

    /// Keeps the usable numbers; reports the rest.
    fn accept(&mut self, position: usize, hit: &Hit, numbers: Vec<u32>) -> Option<BTreeSet<u32>> {
        let max = self.options.max_reference_number;
        let mut set = BTreeSet::new();
        for number in numbers {
            if number == 0 || number > max {
                let reason = format!("{} is not a reference number", number);
                self.malformed(position, hit, &reason);
            } else {
                set.insert(number);
            }
        }
        (!set.is_empty()).then_some(set)
    }

    fn malformed(&mut self, position: usize, hit: &Hit, reason: &str) {
        self.diagnostics.push(Diagnostic::MalformedMarker {
            position,
            text: hit.text.to_string(),
            reason: reason.to_string(),
        });
    }

    fn paragraph_context(&self, text: &str) -> String {
        truncate_chars(&collapse_whitespace(text), self.options.max_context_len).0
    }

    fn window_context(&self, text: &str, hit: &Hit) -> String {
        let radius = self.options.context_radius;
        let before: Vec<(usize, char)> = text[..hit.start].char_indices().collect();
        let from = before
            .len()
            .checked_sub(radius)
            .and_then(|i| before.get(i))
            .map_or(0, |(i, _)| *i);
        let to = text[hit.end..]
            .char_indices()
            .nth(radius)
            .map_or(text.len(), |(i, _)| hit.end + i);
        truncate_chars(&collapse_whitespace(&text[from..to]), self.options.max_context_len).0
    }
}

/// Character offset in the document of byte `offset` inside `paragraph`.
fn char_position(paragraph: &Paragraph, text: &str, offset: usize) -> usize {
    paragraph.char_start + text[..offset].chars().count()
}

fn whole<'t>(cap: &regex::Captures<'t>) -> Hit<'t> {
    let full = cap.get(0).expect("group 0 always participates");
    Hit {
        start: full.start(),
        end: full.end(),
        marker: full.start(),
        text: full.as_str(),
    }
}

fn split_range(element: &str) -> Option<(&str, &str)> {
    let separator = RANGE_SEPARATOR_REGEX.find(element)?;
    Some((&element[..separator.start()], &element[separator.end()..]))
}

/// Locates every citation marker in the body of `document`.
///
/// The bibliography section is never scanned. Markers are reported per
/// paragraph, matcher by matcher, in the order of [`Matcher::ALL`].
///
/// # Examples
///
/// ```
/// use citemap::{locate_citations, Document, ReferenceTable, ResolveOptions};
///
/// let options = ResolveOptions::default();
/// let doc = Document::parse("Broad coverage [3, 7, 9].", &options).unwrap();
/// let located = locate_citations(&doc, &ReferenceTable::new(), &options);
/// assert_eq!(located.occurrences.len(), 1);
/// assert_eq!(located.occurrences[0].referenced_numbers.len(), 3);
/// ```
pub fn locate_citations(
    document: &Document,
    references: &ReferenceTable,
    options: &ResolveOptions,
) -> LocatedCitations {
    Scanner::new(document, references, options).scan()
}
