//! Shared document builders and helpers for integration tests.

#![allow(dead_code)]

use citemap::{resolve, ResolveOptions, ResolvedMap};

/// Build a paper whose bibliography uses standalone `N. text` lines.
///
/// `entries` are full lines, e.g. `"3. Smith, J. (2020) Title"`.
pub fn paper(body: &str, entries: &[&str]) -> String {
    format!("{}\n\n## References\n\n{}\n", body, entries.join("\n"))
}

/// Build a paper whose bibliography entries are headings (`## N. text`),
/// as PDF-to-markdown converters often emit them.
pub fn heading_paper(body: &str, entries: &[&str]) -> String {
    let headings: Vec<String> = entries.iter().map(|e| format!("## {}", e)).collect();
    format!("{}\n\n## References\n\n{}\n", body, headings.join("\n\n"))
}

/// Build `count` standalone entries numbered from 1, each with a distinct
/// author and a year.
pub fn numbered_entries(count: u32) -> Vec<String> {
    (1..=count)
        .map(|n| format!("{}. Author, A. (2001) Title number {}.", n, n))
        .collect()
}

/// Resolve with default options, panicking on fatal errors.
pub fn resolve_default(text: &str) -> ResolvedMap {
    resolve(text, &ResolveOptions::default()).expect("document should resolve")
}

/// `(reference number, citation count)` for every cited reference.
pub fn cited_counts(map: &ResolvedMap) -> Vec<(u32, usize)> {
    map.cited
        .iter()
        .map(|&n| (n, map.citation_count(n)))
        .collect()
}
