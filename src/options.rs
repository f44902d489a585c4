//! Resolution policy.
//!
//! Every heuristic threshold used by the pipeline lives here, so that
//! document-format quirks are handled by configuration rather than code.

use serde::{Deserialize, Serialize};

/// Default pattern for the bibliography heading (multi-line, case-insensitive).
pub const DEFAULT_BIBLIOGRAPHY_HEADING: &str =
    r"^#{1,6}[ \t]*(?:references|bibliography|works cited|literature cited)[ \t]*:?[ \t]*$";

/// How the context attached to each occurrence is cut from the paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// The whole enclosing paragraph, truncated to `max_context_len`.
    #[default]
    Paragraph,
    /// `context_radius` characters on each side of the marker.
    Window,
}

/// Policy object for a single `resolve` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveOptions {
    /// Regex locating the bibliography heading line.
    pub bibliography_heading: String,
    /// Lines starting with one of these end the bibliography section.
    pub trailing_markers: Vec<String>,
    /// Occurrences of one reference closer than this (in characters) collapse.
    pub dedup_radius: usize,
    /// Maximum number of references a single range marker expands to.
    pub range_cap: usize,
    /// Reconstruct numbers rendered with spaces between their digits.
    pub spaced_digits: bool,
    /// Run the author-year corroborating matcher.
    pub author_year: bool,
    pub context_mode: ContextMode,
    /// Characters on each side of the marker in `window` mode.
    pub context_radius: usize,
    /// Maximum context length in characters, before the `...` marker.
    pub max_context_len: usize,
    /// Maximum reference text length in characters, before the `...` marker.
    pub max_reference_len: usize,
    /// Numbers above this are never reference numbers (years, page numbers).
    pub max_reference_number: u32,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            bibliography_heading: DEFAULT_BIBLIOGRAPHY_HEADING.to_string(),
            trailing_markers: vec!["Publisher's Note".to_string(), "Publisher".to_string()],
            dedup_radius: 5,
            range_cap: 10,
            spaced_digits: true,
            author_year: true,
            context_mode: ContextMode::Paragraph,
            context_radius: 150,
            max_context_len: 300,
            max_reference_len: 500,
            max_reference_number: 999,
        }
    }
}

impl ResolveOptions {
    /// Checks the values that would make the pipeline meaningless.
    ///
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.bibliography_heading.trim().is_empty() {
            return Err("bibliography_heading must not be empty".to_string());
        }
        if self.range_cap == 0 {
            return Err("range_cap must be at least 1".to_string());
        }
        if self.max_context_len == 0 {
            return Err("max_context_len must be at least 1".to_string());
        }
        if self.max_reference_len == 0 {
            return Err("max_reference_len must be at least 1".to_string());
        }
        if self.max_reference_number == 0 {
            return Err("max_reference_number must be at least 1".to_string());
        }
        Ok(())
    }

    /// Returns true if `line` begins with one of the trailing-section markers.
    pub fn is_trailing_marker(&self, line: &str) -> bool {
        let line = line.trim_start();
        self.trailing_markers
            .iter()
            .any(|marker| !marker.is_empty() && line.starts_with(marker.as_str()))
    }
}
