//! Occurrence aggregation.
//!
//! Expands multi-reference markers into one logical occurrence per
//! reference, groups them by reference number, and collapses detections of
//! the same physical marker made by different matchers.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::markdown::CitationOccurrence;

/// Occurrences attributed to one reference number, ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationGroup {
    pub number: u32,
    pub occurrences: Vec<CitationOccurrence>,
}

/// Deduplicated occurrences keyed by reference number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregated {
    pub groups: BTreeMap<u32, CitationGroup>,
    /// Raw detections dropped as duplicates of a kept occurrence.
    pub suppressed: usize,
}

/// Groups raw occurrences by reference number and removes duplicates.
///
/// Within a group, occurrences are sorted by position (ties keep scan
/// order, so the earlier matcher wins) and any occurrence within
/// `dedup_radius` characters of the previously kept one is dropped.
///
/// # Examples
///
/// ```
/// use citemap::{aggregate, locate_citations, Document, ReferenceTable, ResolveOptions};
///
/// let options = ResolveOptions::default();
/// let doc = Document::parse("See [3, 7] and [7].", &options).unwrap();
/// let located = locate_citations(&doc, &ReferenceTable::new(), &options);
/// let aggregated = aggregate(&located.occurrences, options.dedup_radius);
/// assert_eq!(aggregated.groups[&7].occurrences.len(), 2);
/// assert_eq!(aggregated.groups[&3].occurrences.len(), 1);
/// ```
pub fn aggregate(occurrences: &[CitationOccurrence], dedup_radius: usize) -> Aggregated {
    let mut expanded: BTreeMap<u32, Vec<&CitationOccurrence>> = BTreeMap::new();
    for occurrence in occurrences {
        for &number in &occurrence.referenced_numbers {
            expanded.entry(number).or_default().push(occurrence);
        }
    }

    let mut aggregated = Aggregated::default();
    for (number, mut candidates) in expanded {
        candidates.sort_by_key(|o| o.position);

        let mut kept: Vec<CitationOccurrence> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let duplicate = kept
                .last()
                .is_some_and(|last| candidate.position - last.position <= dedup_radius);
            if duplicate {
                aggregated.suppressed += 1;
            } else {
                kept.push(candidate.clone());
            }
        }

        aggregated.groups.insert(
            number,
            CitationGroup {
                number,
                occurrences: kept,
            },
        );
    }

    debug!(
        "Aggregated citations for {} reference numbers ({} duplicates suppressed)",
        aggregated.groups.len(),
        aggregated.suppressed
    );
    aggregated
}
