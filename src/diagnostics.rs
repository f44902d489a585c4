//! Errors and diagnostics.
//!
//! Only the failure to obtain a usable input document (or a broken
//! configuration) is fatal. Every other irregularity is recovered locally
//! and reported as a [`Diagnostic`] next to the result.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Fatal errors: the pipeline does not run.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// How much attention a diagnostic deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// A recovered, non-fatal condition found while resolving one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No bibliography heading was found; the reference table is empty.
    MissingSection,
    /// A numbered entry whose number could not be reconstructed.
    MalformedEntry {
        line: usize,
        text: String,
        reason: String,
    },
    /// A later entry reused a number already in the table and was discarded.
    DuplicateReference { number: u32, line: usize },
    /// Numbers absent from `1..=max` in the reference table.
    NumberingGap { missing: Vec<u32> },
    /// A reference entry hit the length cap.
    TruncatedEntry { number: u32 },
    /// A bracket marker that looked like a citation but could not be used.
    MalformedMarker {
        position: usize,
        text: String,
        reason: String,
    },
    /// The author-year matcher for one reference could not be built.
    PatternConstruction { number: u32, reason: String },
    /// A marker number that is not in the reference table.
    UnresolvedCitation { number: u32, occurrences: usize },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::MissingSection
            | Diagnostic::MalformedEntry { .. }
            | Diagnostic::DuplicateReference { .. }
            | Diagnostic::MalformedMarker { .. }
            | Diagnostic::UnresolvedCitation { .. } => Severity::Warning,
            Diagnostic::NumberingGap { .. }
            | Diagnostic::TruncatedEntry { .. }
            | Diagnostic::PatternConstruction { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingSection => write!(f, "no bibliography section found"),
            Diagnostic::MalformedEntry { line, text, reason } => {
                write!(f, "line {}: skipped entry '{}': {}", line, text, reason)
            }
            Diagnostic::DuplicateReference { number, line } => {
                write!(f, "line {}: duplicate reference {} discarded", line, number)
            }
            Diagnostic::NumberingGap { missing } => {
                let list: Vec<String> = missing.iter().map(|n| n.to_string()).collect();
                write!(f, "missing reference numbers: {}", list.join(", "))
            }
            Diagnostic::TruncatedEntry { number } => {
                write!(f, "reference {} truncated", number)
            }
            Diagnostic::MalformedMarker {
                position,
                text,
                reason,
            } => write!(f, "offset {}: ignored marker '{}': {}", position, text, reason),
            Diagnostic::PatternConstruction { number, reason } => {
                write!(f, "reference {}: no author-year matcher: {}", number, reason)
            }
            Diagnostic::UnresolvedCitation {
                number,
                occurrences,
            } => write!(
                f,
                "citation [{}] ({} occurrence(s)) has no bibliography entry",
                number, occurrences
            ),
        }
    }
}
