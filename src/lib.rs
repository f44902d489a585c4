//! citemap: map numeric in-text citations to bibliography entries.
//!
//! This library provides functionality to:
//! - Locate the bibliography section of a Markdown document and parse its
//!   numbered entries, including numbers split by PDF conversion (`1 0.`)
//! - Find citation markers in the body text (`[7]`, `[3, 7]`, `[5-9]`,
//!   `[ 1 2 ]`, author-year text next to a marker)
//! - Deduplicate and resolve them into a per-reference citation map
//! - Render the map as CSV, JSON, or a markdown summary

pub mod aggregate;
pub mod diagnostics;
pub mod document;
pub mod markdown;
pub mod options;
pub mod output;
pub mod preset;
pub mod processor;
pub mod refs;

pub use aggregate::{aggregate, Aggregated, CitationGroup};
pub use diagnostics::{Diagnostic, ResolveError, Severity};
pub use document::{load_document, Document, Paragraph, Section};
pub use markdown::{locate_citations, CitationOccurrence, LocatedCitations, Matcher};
pub use options::{ContextMode, ResolveOptions};
pub use output::{
    reference_rows, references_json, render_summary, write_csv, write_json, OutputError,
    ReferenceRow,
};
pub use preset::{builtin_preset, builtin_preset_names, load_options, parse_options, OptionsError};
pub use processor::{
    resolve, resolve_citations, resolve_document, CoverageStats, ResolvedMap, ResolvedReference,
};
pub use refs::{parse_references, NumberEncoding, ParsedReferences, ReferenceEntry, ReferenceTable};
