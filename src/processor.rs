//! Citation resolution.
//!
//! This module joins the reference table with the aggregated occurrences
//! and drives the whole pipeline through [`resolve`].

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::aggregate::{aggregate, CitationGroup};
use crate::diagnostics::{Diagnostic, ResolveError};
use crate::document::Document;
use crate::markdown::{locate_citations, CitationOccurrence};
use crate::options::ResolveOptions;
use crate::refs::{parse_references, ReferenceEntry, ReferenceTable};

/// A bibliography entry together with the places it is cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub entry: ReferenceEntry,
    /// Deduplicated occurrences, ordered by position.
    pub occurrences: Vec<CitationOccurrence>,
}

impl ResolvedReference {
    pub fn citation_count(&self) -> usize {
        self.occurrences.len()
    }
}

/// Summary counts for one resolved document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageStats {
    pub total_references: usize,
    /// Occurrences attributed to references in the table.
    pub total_occurrences: usize,
    pub cited_count: usize,
    /// `cited_count / total_references`, or 0 for an empty table.
    pub coverage: f64,
    /// Raw detections collapsed by the aggregator.
    pub suppressed: usize,
}

impl CoverageStats {
    pub fn coverage_percent(&self) -> f64 {
        self.coverage * 100.0
    }
}

/// The result of resolving one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMap {
    /// Every table entry, cited or not, keyed by reference number.
    pub references: BTreeMap<u32, ResolvedReference>,
    pub cited: BTreeSet<u32>,
    pub uncited: BTreeSet<u32>,
    /// Marker numbers with no bibliography entry.
    pub unresolved: BTreeSet<u32>,
    pub stats: CoverageStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedMap {
    pub fn get(&self, number: u32) -> Option<&ResolvedReference> {
        self.references.get(&number)
    }

    /// Occurrence count for `number`; 0 for uncited or unknown numbers.
    pub fn citation_count(&self, number: u32) -> usize {
        self.get(number).map_or(0, ResolvedReference::citation_count)
    }

    /// The `n` most cited references, most cited first.
    ///
    /// Ties are broken by ascending reference number. Uncited references
    /// are never listed.
    pub fn most_cited(&self, n: usize) -> Vec<&ResolvedReference> {
        let mut ranked: Vec<&ResolvedReference> = self
            .references
            .values()
            .filter(|r| r.citation_count() > 0)
            .collect();
        ranked.sort_by(|a, b| {
            b.citation_count()
                .cmp(&a.citation_count())
                .then(a.entry.number.cmp(&b.entry.number))
        });
        ranked.truncate(n);
        ranked
    }

    /// Pairs of `(citation count, number of references cited that often)`,
    /// highest count first. Uncited references are not counted.
    pub fn citation_distribution(&self) -> Vec<(usize, usize)> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for reference in self.references.values() {
            let count = reference.citation_count();
            if count > 0 {
                *counts.entry(count).or_default() += 1;
            }
        }
        counts.into_iter().rev().collect()
    }

    /// Rebuilds the reference table the map was resolved against.
    pub fn reference_table(&self) -> ReferenceTable {
        let mut table = ReferenceTable::new();
        for reference in self.references.values() {
            table.insert(reference.entry.clone());
        }
        table
    }
}

/// Joins the reference table with aggregated citation groups.
///
/// Groups whose number is not in the table are reported as
/// `UnresolvedCitation` diagnostics and listed in `unresolved`.
/// `diagnostics` holds only those; `resolve` prepends the earlier stages'.
pub fn resolve_citations(
    table: &ReferenceTable,
    mut groups: BTreeMap<u32, CitationGroup>,
    suppressed: usize,
) -> ResolvedMap {
    let mut references = BTreeMap::new();
    let mut cited = BTreeSet::new();
    let mut uncited = BTreeSet::new();
    let mut total_occurrences = 0;

    for entry in table.iter() {
        let occurrences = groups
            .remove(&entry.number)
            .map(|group| group.occurrences)
            .unwrap_or_default();
        if occurrences.is_empty() {
            uncited.insert(entry.number);
        } else {
            cited.insert(entry.number);
        }
        total_occurrences += occurrences.len();
        references.insert(
            entry.number,
            ResolvedReference {
                entry: entry.clone(),
                occurrences,
            },
        );
    }

    // Whatever is left was cited but never listed.
    let mut diagnostics = Vec::new();
    let mut unresolved = BTreeSet::new();
    for (number, group) in groups {
        unresolved.insert(number);
        diagnostics.push(Diagnostic::UnresolvedCitation {
            number,
            occurrences: group.occurrences.len(),
        });
    }

    let total_references = table.len();
    let coverage = if total_references == 0 {
        0.0
    } else {
        cited.len() as f64 / total_references as f64
    };

    ResolvedMap {
        references,
        stats: CoverageStats {
            total_references,
            total_occurrences,
            cited_count: cited.len(),
            coverage,
            suppressed,
        },
        cited,
        uncited,
        unresolved,
        diagnostics,
    }
}

/// Resolves every citation marker in `document_text` against its own
/// bibliography.
///
/// Diagnostics are ordered by stage: reference parsing, then citation
/// location, then resolution.
///
/// # Errors
///
/// Fails only when the options are invalid or the document is empty;
/// everything else is reported through `ResolvedMap::diagnostics`.
///
/// # Examples
///
/// ```
/// use citemap::{resolve, ResolveOptions};
///
/// let text = "water quality [1] and privacy [10].\n\n## References\n\n\
///             ## 1. Smith, J. (2020) Title A\n\n## 1 0. Jones, A. (2019) Title B\n";
/// let map = resolve(text, &ResolveOptions::default()).unwrap();
/// assert_eq!(map.citation_count(1), 1);
/// assert_eq!(map.citation_count(10), 1);
/// assert!(map.uncited.is_empty());
/// ```
pub fn resolve(document_text: &str, options: &ResolveOptions) -> Result<ResolvedMap, ResolveError> {
    options.validate().map_err(ResolveError::InvalidOptions)?;
    let document = Document::parse(document_text, options)?;
    Ok(resolve_document(&document, options))
}

/// Runs the pipeline on an already parsed document.
pub fn resolve_document(document: &Document, options: &ResolveOptions) -> ResolvedMap {
    let parsed = parse_references(document, options);
    let located = locate_citations(document, &parsed.table, options);
    debug!(
        "Located {} raw citation occurrences in {} paragraphs",
        located.occurrences.len(),
        document.paragraphs().len()
    );

    let aggregated = aggregate(&located.occurrences, options.dedup_radius);
    let mut map = resolve_citations(&parsed.table, aggregated.groups, aggregated.suppressed);

    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(located.diagnostics);
    diagnostics.append(&mut map.diagnostics);
    map.diagnostics = diagnostics;

    debug!(
        "Resolved {} of {} references ({} unresolved numbers)",
        map.stats.cited_count,
        map.stats.total_references,
        map.unresolved.len()
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Matcher;
    use crate::refs::NumberEncoding;

    fn table(numbers: &[u32]) -> ReferenceTable {
        let mut table = ReferenceTable::new();
        for &number in numbers {
            table.insert(ReferenceEntry {
                number,
                text: format!("Author{} (2020) Title", number),
                encoding: NumberEncoding::Standalone,
            });
        }
        table
    }

    fn group(number: u32, positions: &[usize]) -> (u32, CitationGroup) {
        let occurrences = positions
            .iter()
            .map(|&position| CitationOccurrence {
                referenced_numbers: [number].into_iter().collect(),
                matched_text: format!("[{}]", number),
                matcher: Matcher::BracketSingle,
                position,
                span: (position, position + 3),
                paragraph_index: 0,
                context: String::new(),
            })
            .collect();
        (
            number,
            CitationGroup {
                number,
                occurrences,
            },
        )
    }

    // ===========================================
    // Tests for resolve_citations
    // ===========================================

    #[test]
    fn test_cited_and_uncited_partition_table() {
        // Given: references 1..=4, citations for 1 and 3
        let refs = table(&[1, 2, 3, 4]);
        let groups = BTreeMap::from([group(1, &[10]), group(3, &[20, 40])]);

        // When: we resolve
        let map = resolve_citations(&refs, groups, 0);

        // Then: cited and uncited partition the table
        assert_eq!(map.cited, BTreeSet::from([1, 3]));
        assert_eq!(map.uncited, BTreeSet::from([2, 4]));
        assert!(map.unresolved.is_empty());
        assert_eq!(map.stats.total_occurrences, 3);
        assert_eq!(map.stats.coverage, 0.5);
        assert_eq!(map.references.len(), 4);
    }

    #[test]
    fn test_unresolved_numbers_reported() {
        // Given: a citation for a number not in the table
        let refs = table(&[1]);
        let groups = BTreeMap::from([group(1, &[5]), group(42, &[30, 60])]);

        // When: we resolve
        let map = resolve_citations(&refs, groups, 0);

        // Then: 42 is unresolved, with a diagnostic, and not counted
        assert_eq!(map.unresolved, BTreeSet::from([42]));
        assert_eq!(
            map.diagnostics,
            vec![Diagnostic::UnresolvedCitation {
                number: 42,
                occurrences: 2
            }]
        );
        assert_eq!(map.stats.total_occurrences, 1);
        assert!(map.get(42).is_none());
    }

    #[test]
    fn test_empty_table_has_zero_coverage() {
        let map = resolve_citations(&ReferenceTable::new(), BTreeMap::new(), 0);
        assert_eq!(map.stats.coverage, 0.0);
        assert_eq!(map.stats.total_references, 0);
    }

    #[test]
    fn test_most_cited_ranks_by_count_then_number() {
        // Given: 2 and 5 tie on two citations, 3 has three
        let refs = table(&[1, 2, 3, 5]);
        let groups = BTreeMap::from([
            group(5, &[10, 50]),
            group(2, &[20, 60]),
            group(3, &[30, 70, 90]),
        ]);
        let map = resolve_citations(&refs, groups, 0);

        // When: we ask for the most cited
        let ranked: Vec<u32> = map.most_cited(10).iter().map(|r| r.entry.number).collect();

        // Then: count descending, ties by ascending number, uncited excluded
        assert_eq!(ranked, vec![3, 2, 5]);
        assert_eq!(map.most_cited(1).len(), 1);
    }

    #[test]
    fn test_citation_distribution() {
        let refs = table(&[1, 2, 3, 4]);
        let groups = BTreeMap::from([group(1, &[10]), group(2, &[20]), group(3, &[30, 60])]);
        let map = resolve_citations(&refs, groups, 0);

        assert_eq!(map.citation_distribution(), vec![(2, 1), (1, 2)]);
    }

    #[test]
    fn test_reference_table_round_trips_entries() {
        let refs = table(&[1, 7]);
        let map = resolve_citations(&refs, BTreeMap::new(), 0);
        assert_eq!(map.reference_table(), refs);
    }

    // ===========================================
    // Tests for resolve
    // ===========================================

    #[test]
    fn test_resolve_rejects_invalid_options() {
        let options = ResolveOptions {
            range_cap: 0,
            ..ResolveOptions::default()
        };
        let result = resolve("Text [1].", &options);
        assert!(matches!(result, Err(ResolveError::InvalidOptions(_))));
    }

    #[test]
    fn test_resolve_rejects_empty_document() {
        let result = resolve("\n\n", &ResolveOptions::default());
        assert!(matches!(result, Err(ResolveError::EmptyDocument)));
    }

    #[test]
    fn test_resolve_without_bibliography() {
        // Given: citations but no bibliography heading
        let map = resolve("Claims [1] and [2].", &ResolveOptions::default()).unwrap();

        // Then: the table is empty, both numbers are unresolved
        assert!(map.references.is_empty());
        assert_eq!(map.unresolved, BTreeSet::from([1, 2]));
        assert_eq!(map.diagnostics[0], Diagnostic::MissingSection);
        assert_eq!(map.diagnostics.len(), 3);
    }

    #[test]
    fn test_resolve_diagnostics_ordered_by_stage() {
        // Given: a gap in the numbering, a bad marker and an unknown number
        let text = "See [0] and [9].\n\n## References\n\n1. Smith (2020) A\n3. Jones (2019) B\n";
        let map = resolve(text, &ResolveOptions::default()).unwrap();

        // Then: parser diagnostics come first, then the locator's, then unresolved
        let kinds: Vec<&str> = map
            .diagnostics
            .iter()
            .map(|d| match d {
                Diagnostic::NumberingGap { .. } => "gap",
                Diagnostic::MalformedMarker { .. } => "marker",
                Diagnostic::UnresolvedCitation { .. } => "unresolved",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["gap", "marker", "unresolved"]);
    }

    #[test]
    fn test_resolve_counts_suppressed_duplicates() {
        // Given: a reference whose author-year text sits next to its marker
        let text = "Smith (2020) showed this [1].\n\n## References\n\n1. Smith, J. (2020) Water.\n";
        let map = resolve(text, &ResolveOptions::default()).unwrap();

        // Then: bracket and author-year detections collapse into one
        assert_eq!(map.citation_count(1), 1);
        assert_eq!(map.stats.suppressed, 1);
    }
}
