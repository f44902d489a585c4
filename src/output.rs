//! Report generation for resolved citation maps.
//!
//! Turns a [`ResolvedMap`] into the per-reference table (CSV), a JSON dump,
//! and a markdown narrative summary. Nothing here depends on the clock, so
//! identical maps always render identically.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::processor::ResolvedMap;
use crate::refs::{truncate_chars, ReferenceEntry, ReferenceTable};

/// Reference text shown per entry in the "most cited" list.
const SUMMARY_TEXT_LEN: usize = 200;

/// Errors that can occur while writing reports.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One line of the citation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRow {
    pub ref_number: u32,
    pub reference_text: String,
    pub citation_count: usize,
    /// The first `k` contexts.
    pub sample_contexts: Vec<String>,
    pub all_contexts: Vec<String>,
}

/// Builds one row per reference, in ascending number order.
pub fn reference_rows(map: &ResolvedMap, sample_k: usize) -> Vec<ReferenceRow> {
    map.references
        .values()
        .map(|reference| {
            let all_contexts: Vec<String> = reference
                .occurrences
                .iter()
                .map(|o| o.context.clone())
                .collect();
            ReferenceRow {
                ref_number: reference.entry.number,
                reference_text: reference.entry.text.clone(),
                citation_count: reference.citation_count(),
                sample_contexts: all_contexts.iter().take(sample_k).cloned().collect(),
                all_contexts,
            }
        })
        .collect()
}

/// Writes the citation table as CSV.
///
/// Columns are `Reference_Number`, `Reference_Text`, `Citation_Count`,
/// `Context_1` to `Context_k`, and `Additional_Contexts` holding the
/// remaining contexts joined with ` | `.
pub fn write_csv<W: Write>(
    rows: &[ReferenceRow],
    writer: W,
    sample_k: usize,
) -> Result<(), OutputError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![
        "Reference_Number".to_string(),
        "Reference_Text".to_string(),
        "Citation_Count".to_string(),
    ];
    header.extend((1..=sample_k).map(|i| format!("Context_{}", i)));
    header.push("Additional_Contexts".to_string());
    csv.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.ref_number.to_string(),
            row.reference_text.clone(),
            row.citation_count.to_string(),
        ];
        for i in 0..sample_k {
            record.push(row.sample_contexts.get(i).cloned().unwrap_or_default());
        }
        let rest: Vec<&str> = row
            .all_contexts
            .iter()
            .skip(sample_k)
            .map(String::as_str)
            .collect();
        record.push(rest.join(" | "));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes the whole map as pretty-printed JSON.
pub fn write_json<W: Write>(map: &ResolvedMap, mut writer: W) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut writer, map)?;
    writeln!(writer)?;
    Ok(())
}

#[derive(Serialize)]
struct ReferenceList<'a> {
    total_references: usize,
    references: Vec<&'a ReferenceEntry>,
}

/// Renders the extracted reference list as JSON.
pub fn references_json(table: &ReferenceTable) -> Result<String, OutputError> {
    let list = ReferenceList {
        total_references: table.len(),
        references: table.iter().collect(),
    };
    Ok(serde_json::to_string_pretty(&list)?)
}

/// Renders the markdown summary report.
///
/// # Examples
///
/// ```
/// use citemap::{render_summary, resolve, ResolveOptions};
///
/// let text = "See [1].\n\n## References\n\n1. Smith (2020) A\n";
/// let map = resolve(text, &ResolveOptions::default()).unwrap();
/// let summary = render_summary(&map, 10);
/// assert!(summary.contains("- **Coverage:** 100.0%"));
/// ```
pub fn render_summary(map: &ResolvedMap, top_n: usize) -> String {
    let stats = &map.stats;
    let mut lines = vec![
        "# Citation Analysis Report".to_string(),
        String::new(),
        "## Summary Statistics".to_string(),
        String::new(),
        format!("- **Total References in Bibliography:** {}", stats.total_references),
        format!("- **Total Citation Instances Found:** {}", stats.total_occurrences),
        format!("- **References with Citations:** {}", stats.cited_count),
        format!("- **Coverage:** {:.1}%", stats.coverage_percent()),
        String::new(),
        format!("## Top {} Most Cited References", top_n),
        String::new(),
    ];

    let top = map.most_cited(top_n);
    if top.is_empty() {
        lines.push("No citations found.".to_string());
        lines.push(String::new());
    }
    for (rank, reference) in top.iter().enumerate() {
        let (text, _) = truncate_chars(&reference.entry.text, SUMMARY_TEXT_LEN);
        lines.push(format!(
            "{}. **Reference {}** ({} citations)",
            rank + 1,
            reference.entry.number,
            reference.citation_count()
        ));
        lines.push(format!("   {}", text));
        lines.push(String::new());
    }

    lines.push("## Citation Distribution".to_string());
    lines.push(String::new());
    for (count, references) in map.citation_distribution() {
        lines.push(format!("- {} references cited {} time(s)", references, count));
    }
    lines.push(String::new());

    lines.push("## Uncited References".to_string());
    lines.push(String::new());
    lines.push(number_list(map.uncited.iter()));
    lines.push(String::new());

    lines.push("## Unresolved Citations".to_string());
    lines.push(String::new());
    lines.push(number_list(map.unresolved.iter()));
    lines.push(String::new());

    lines.push("## Diagnostics".to_string());
    lines.push(String::new());
    lines.push(format!("{} diagnostic(s) reported.", map.diagnostics.len()));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn number_list<'a>(numbers: impl Iterator<Item = &'a u32>) -> String {
    let list: Vec<String> = numbers.map(|n| n.to_string()).collect();
    if list.is_empty() {
        "None.".to_string()
    } else {
        list.join(", ")
    }
}
