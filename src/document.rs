//! Document model.
//!
//! Splits the input into body paragraphs and locates the bibliography
//! section. Paragraphs are maximal runs of non-blank, non-heading lines
//! outside the bibliography; positions are tracked both as byte offsets
//! (for slicing) and character offsets (for reporting).

use std::fs;
use std::ops::Range;
use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::diagnostics::ResolveError;
use crate::options::ResolveOptions;

/// A block of body text between blank lines or headings.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// Zero-based index among body paragraphs, in document order.
    pub index: usize,
    /// Byte range in the document text.
    pub span: Range<usize>,
    /// Character offset of the first byte of the paragraph.
    pub char_start: usize,
}

/// The located bibliography section.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Byte range from the heading line to the end boundary.
    pub span: Range<usize>,
    /// Byte offset of the first line after the heading.
    pub body_start: usize,
    /// One-based line number of the first line after the heading.
    pub body_line: usize,
    /// True if the section ends at a heading or trailing marker rather
    /// than at the end of the document.
    pub bounded: bool,
}

/// An input document, normalized to LF line endings.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    bibliography: Option<Section>,
    paragraphs: Vec<Paragraph>,
}

/// Reads a document from disk.
///
/// # Errors
///
/// Returns `ResolveError::Io` if the file cannot be read and
/// `ResolveError::EmptyDocument` if it holds nothing but whitespace.
pub fn load_document(path: &Path) -> Result<String, ResolveError> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(ResolveError::EmptyDocument);
    }
    Ok(content)
}

/// Compiles the configured bibliography heading pattern.
pub fn heading_regex(pattern: &str) -> Result<Regex, ResolveError> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .case_insensitive(true)
        .build()
        .map_err(|e| ResolveError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Iterates `(byte_offset, line)` pairs, without the trailing newline.
pub(crate) fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.strip_suffix('\n').unwrap_or(raw))
    })
}

/// Returns the heading title if `line` is a markdown heading.
pub(crate) fn heading_title(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        Some(trimmed.trim_start_matches('#').trim_start())
    } else {
        None
    }
}

impl Document {
    /// Builds a document from raw text.
    ///
    /// # Errors
    ///
    /// Fails on an empty document or an invalid heading pattern. A missing
    /// bibliography is not an error: `bibliography()` is then `None`.
    pub fn parse(raw: &str, options: &ResolveOptions) -> Result<Self, ResolveError> {
        let text = raw.replace("\r\n", "\n");
        if text.trim().is_empty() {
            return Err(ResolveError::EmptyDocument);
        }

        let heading = heading_regex(&options.bibliography_heading)?;
        let bibliography = locate_bibliography(&text, &heading, options);
        let paragraphs = split_paragraphs(&text, bibliography.as_ref().map(|s| &s.span));

        Ok(Self {
            text,
            bibliography,
            paragraphs,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bibliography(&self) -> Option<&Section> {
        self.bibliography.as_ref()
    }

    /// The bibliography text after its heading line, if there is one.
    pub fn bibliography_body(&self) -> Option<&str> {
        self.bibliography
            .as_ref()
            .map(|section| &self.text[section.body_start..section.span.end])
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph_text(&self, paragraph: &Paragraph) -> &str {
        &self.text[paragraph.span.clone()]
    }
}

fn locate_bibliography(text: &str, heading: &Regex, options: &ResolveOptions) -> Option<Section> {
    let found = heading.find(text)?;
    let heading_start = text[..found.start()].rfind('\n').map_or(0, |i| i + 1);
    let body_start = text[found.end()..]
        .find('\n')
        .map_or(text.len(), |i| found.end() + i + 1);
    let body_line = text[..body_start].matches('\n').count() + 1;

    for (offset, line) in lines_with_offsets(&text[body_start..]) {
        let is_boundary = match heading_title(line) {
            Some(title) => !title.starts_with(|c: char| c.is_ascii_digit()),
            None => options.is_trailing_marker(line),
        };
        if is_boundary {
            return Some(Section {
                span: heading_start..body_start + offset,
                body_start,
                body_line,
                bounded: true,
            });
        }
    }

    Some(Section {
        span: heading_start..text.len(),
        body_start,
        body_line,
        bounded: false,
    })
}

fn split_paragraphs(text: &str, excluded: Option<&Range<usize>>) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Option<(usize, usize, usize)> = None; // (start, end, char_start)
    let mut chars_before = 0;

    fn flush(current: &mut Option<(usize, usize, usize)>, paragraphs: &mut Vec<Paragraph>) {
        if let Some((start, end, char_start)) = current.take() {
            paragraphs.push(Paragraph {
                index: paragraphs.len(),
                span: start..end,
                char_start,
            });
        }
    }

    for (offset, line) in lines_with_offsets(text) {
        let in_bibliography = excluded.is_some_and(|range| range.contains(&offset));
        let breaks = in_bibliography || line.trim().is_empty() || heading_title(line).is_some();

        if breaks {
            flush(&mut current, &mut paragraphs);
        } else {
            let end = offset + line.len();
            match current.as_mut() {
                Some(open) => open.1 = end,
                None => current = Some((offset, end, chars_before)),
            }
        }

        chars_before += line.chars().count();
        if offset + line.len() < text.len() {
            chars_before += 1; // newline
        }
    }
    flush(&mut current, &mut paragraphs);

    paragraphs
}
