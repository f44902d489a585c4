//! End-to-end tests for the `resolve` pipeline.

mod common;

use std::collections::BTreeSet;

use citemap::{
    builtin_preset, resolve, ContextMode, Diagnostic, Matcher, ResolveError, ResolveOptions,
    Severity,
};
use common::{cited_counts, heading_paper, numbered_entries, paper, resolve_default};

// ============================================
// Scenarios
// ============================================

#[test]
fn test_split_heading_numbers_resolve() {
    // Given: heading entries, one with its number split by the converter
    let text = heading_paper(
        "water quality [1] and privacy [10].",
        &[
            "1. Smith, J. (2020) Title A",
            "1 0. Jones, A. (2019) Title B",
        ],
    );

    // When: we resolve
    let map = resolve_default(&text);

    // Then: the table has exactly 1 and 10 with their text
    let table: Vec<(u32, &str)> = map
        .references
        .values()
        .map(|r| (r.entry.number, r.entry.text.as_str()))
        .collect();
    assert_eq!(
        table,
        vec![(1, "Smith, J. (2020) Title A"), (10, "Jones, A. (2019) Title B")]
    );

    // And: one occurrence each, full coverage
    assert_eq!(cited_counts(&map), vec![(1, 1), (10, 1)]);
    assert!(map.uncited.is_empty());
    assert_eq!(map.stats.coverage, 1.0);
    assert!(
        map.diagnostics.iter().all(|d| d.severity() == Severity::Info),
        "got: {:?}",
        map.diagnostics
    );
}

#[test]
fn test_list_marker_shares_context() {
    // Given: one list marker citing three references
    let text = paper(
        "broad coverage [3, 7, 9]",
        &[
            "3. Alpha, A. (2010) Three.",
            "7. Beta, B. (2011) Seven.",
            "9. Gamma, C. (2012) Nine.",
        ],
    );

    // When: we resolve
    let map = resolve_default(&text);

    // Then: each reference has one occurrence with the same context
    assert_eq!(cited_counts(&map), vec![(3, 1), (7, 1), (9, 1)]);
    let contexts: BTreeSet<&str> = [3, 7, 9]
        .iter()
        .map(|&n| map.get(n).unwrap().occurrences[0].context.as_str())
        .collect();
    assert_eq!(contexts, BTreeSet::from(["broad coverage [3, 7, 9]"]));
}

// ============================================
// Properties
// ============================================

#[test]
fn test_reference_numbers_unique() {
    // Given: the same number listed twice
    let text = paper(
        "Cited [2].",
        &["1. First (2000) A.", "2. Second (2001) B.", "2. Again (2002) C."],
    );

    // When: we resolve
    let map = resolve_default(&text);

    // Then: the first entry wins and the duplicate is reported
    assert_eq!(map.references.len(), 2);
    assert_eq!(map.get(2).unwrap().entry.text, "Second (2001) B.");
    assert!(map
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::DuplicateReference { number: 2, .. })));
}

#[test]
fn test_every_marker_counted_once() {
    // Given: reference 2 cited in three separate places
    let body = "Intro [2].\n\nMethods follow [2] closely.\n\nResults [1] agree with [2].";
    let text = paper(body, &["1. One (2000) A.", "2. Two (2001) B."]);

    // When: we resolve
    let map = resolve_default(&text);

    // Then: no marker is lost or double counted
    assert_eq!(cited_counts(&map), vec![(1, 1), (2, 3)]);
    assert_eq!(map.stats.total_occurrences, 4);
}

#[test]
fn test_spaced_digits_reconstruct_existing_reference() {
    // Given: references 1, 2 and 12, and a marker split into single digits
    let text = paper(
        "as shown [ 1 2 ].",
        &["1. One (2000) A.", "2. Two (2001) B.", "12. Lee, K. (2021) Twelve."],
    );

    // When: we resolve
    let map = resolve_default(&text);

    // Then: reference 12 gets the citation, not 1 and 2
    assert_eq!(cited_counts(&map), vec![(12, 1)]);
    assert_eq!(
        map.get(12).unwrap().occurrences[0].matcher,
        Matcher::SpacedDigits
    );
}

#[test]
fn test_spaced_digits_fall_back_to_list() {
    // Given: no reference 12
    let text = paper("as shown [ 1 2 ].", &["1. One (2000) A.", "2. Two (2001) B."]);

    // When: we resolve
    let map = resolve_default(&text);

    // Then: the marker cites 1 and 2
    assert_eq!(cited_counts(&map), vec![(1, 1), (2, 1)]);
}

#[test]
fn test_range_expansion_is_capped() {
    // Given: fifty references and an implausibly wide range
    let entries = numbered_entries(50);
    let entries: Vec<&str> = entries.iter().map(String::as_str).collect();
    let text = paper("Reviews [5-50] exist.", &entries);

    // When: we resolve
    let map = resolve_default(&text);

    // Then: only 5 through 14 are cited
    assert_eq!(map.cited, (5..=14).collect::<BTreeSet<u32>>());
}

#[test]
fn test_author_year_and_bracket_collapse() {
    // Given: author and year right before the bracket for the same reference
    let text = paper(
        "Smith et al. (2020) reported gains [4].",
        &["4. Smith, J., Doe, R. (2020) Gains."],
    );

    // When: we resolve
    let map = resolve_default(&text);

    // Then: one occurrence, the bracket detection
    let occurrences = &map.get(4).unwrap().occurrences;
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0].matcher, Matcher::BracketSingle);
    assert_eq!(map.stats.suppressed, 1);
}

#[test]
fn test_cited_and_uncited_partition_references() {
    let bodies = [
        "Nothing cited here.",
        "Only [1].",
        "All of [1-3] and [4].",
        "Unknown [9] and known [2].",
    ];
    let entries = ["1. A (2000) a.", "2. B (2001) b.", "3. C (2002) c.", "4. D (2003) d."];

    for body in bodies {
        let map = resolve_default(&paper(body, &entries));
        let all: BTreeSet<u32> = map.references.keys().copied().collect();

        assert!(map.cited.is_disjoint(&map.uncited), "body: {}", body);
        let union: BTreeSet<u32> = map.cited.union(&map.uncited).copied().collect();
        assert_eq!(union, all, "body: {}", body);
        assert!(map.unresolved.is_disjoint(&all), "body: {}", body);
    }
}

#[test]
fn test_resolution_is_deterministic() {
    // Given: a document exercising every matcher
    let text = heading_paper(
        "Smith (2020) says [1]. Lists [1, 2]; ranges [2-3]; split [ 1 0 ].\n\nAgain [3].",
        &[
            "1. Smith, J. (2020) A",
            "2. Jones, A. (2019) B",
            "3. Brown, C. (2018) C",
            "1 0. Green, D. (2017) D",
        ],
    );

    // When: we resolve twice
    let first = serde_json::to_string(&resolve_default(&text)).unwrap();
    let second = serde_json::to_string(&resolve_default(&text)).unwrap();

    // Then: the outputs are byte-identical
    assert_eq!(first, second);
}

// ============================================
// Degradation and diagnostics
// ============================================

#[test]
fn test_missing_bibliography_degrades() {
    let map = resolve_default("A paper without references [1].");

    assert!(map.references.is_empty());
    assert_eq!(map.unresolved, BTreeSet::from([1]));
    assert_eq!(map.diagnostics.first(), Some(&Diagnostic::MissingSection));
}

#[test]
fn test_empty_document_is_fatal() {
    let result = resolve("   \n", &ResolveOptions::default());
    assert!(matches!(result, Err(ResolveError::EmptyDocument)));
}

#[test]
fn test_unresolved_citation_reported() {
    let text = paper("See [1] and [42].", &["1. One (2000) A."]);
    let map = resolve_default(&text);

    assert_eq!(map.unresolved, BTreeSet::from([42]));
    assert!(map.diagnostics.contains(&Diagnostic::UnresolvedCitation {
        number: 42,
        occurrences: 1
    }));
}

#[test]
fn test_years_in_brackets_are_not_citations() {
    let text = paper("Published [2019] and cited [1].", &["1. One (2000) A."]);
    let map = resolve_default(&text);

    assert_eq!(cited_counts(&map), vec![(1, 1)]);
    assert!(map.unresolved.is_empty());
    assert!(map
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::MalformedMarker { .. })));
}

#[test]
fn test_crlf_input_matches_lf_input() {
    let lf = paper("Cited [1].\n\nAgain [1].", &["1. One (2000) A."]);
    let crlf = lf.replace('\n', "\r\n");

    let a = resolve_default(&lf);
    let b = resolve_default(&crlf);
    assert_eq!(a, b);
}

// ============================================
// Options
// ============================================

#[test]
fn test_contiguous_preset_disables_reconstruction() {
    let text = paper(
        "as shown [ 1 2 ].",
        &["1. One (2000) A.", "2. Two (2001) B.", "12. Lee, K. (2021) Twelve."],
    );
    let options = builtin_preset("contiguous").unwrap();

    let map = resolve(&text, &options).unwrap();

    assert_eq!(cited_counts(&map), vec![(1, 1), (2, 1)]);
}

#[test]
fn test_window_context_mode() {
    // Given: a long paragraph and a small window
    let body = format!("{} marker [1] {}", "x".repeat(100), "y".repeat(100));
    let text = paper(&body, &["1. One (2000) A."]);
    let options = ResolveOptions {
        context_mode: ContextMode::Window,
        context_radius: 10,
        ..ResolveOptions::default()
    };

    // When: we resolve
    let map = resolve(&text, &options).unwrap();

    // Then: the context is the marker and ten characters on each side
    let context = &map.get(1).unwrap().occurrences[0].context;
    assert_eq!(context, &format!("{} marker [1] {}", "x".repeat(2), "y".repeat(9)));
}

#[test]
fn test_dedup_radius_option() {
    // Given: two markers for the same reference four characters apart
    let text = paper("Twice [1] [1].", &["1. One (2000) A."]);

    let default = resolve_default(&text);
    let strict = resolve(
        &text,
        &ResolveOptions {
            dedup_radius: 0,
            ..ResolveOptions::default()
        },
    )
    .unwrap();

    assert_eq!(default.citation_count(1), 1);
    assert_eq!(strict.citation_count(1), 2);
}
