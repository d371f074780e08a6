//! Output formatting for delta coverage results.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::check::CheckOutcome;
use crate::model::{Counters, CoverageCounter, CoverageEntity, FileCoverage};
use crate::violation::Violation;

/// Trait for formatting check outcomes.
pub trait ReportFormatter {
    /// Format the outcome to a string.
    fn format(&self, outcome: &CheckOutcome) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, outcome: &CheckOutcome) -> String {
        let mut out = String::new();

        if !outcome.source.is_empty() {
            writeln!(out, "Diff source: {}", outcome.source).unwrap();
        }
        if outcome.diff_files() == 0 {
            out.push_str("No changed lines found in diff.\n");
        } else {
            let lines = outcome.diff_lines();
            let files = outcome.diff_files();
            writeln!(out, "{lines} lines changed across {files} files").unwrap();
        }

        out.push('\n');
        writeln!(out, "{:<12} {:>20} {:>20}", "ENTITY", "DELTA", "FULL").unwrap();
        writeln!(out, "{}", "-".repeat(54)).unwrap();
        for entity in CoverageEntity::ALL {
            writeln!(
                out,
                "{:<12} {:>20} {:>20}",
                entity.as_str(),
                format_counter(&outcome.delta.counters, entity),
                format_counter(&outcome.full, entity),
            )
            .unwrap();
        }

        let files = files_with_misses(outcome);
        if !files.is_empty() {
            out.push('\n');
            for f in files {
                let line = line_counter(f);
                let path = &f.path;
                let missed = missed_ranges(outcome, f);
                writeln!(
                    out,
                    "  {path}  {}/{} ({:.1}%)  missed: {missed}",
                    line.covered,
                    line.total(),
                    line.covered_ratio() * 100.0
                )
                .unwrap();
            }
        }

        if !outcome.violations.is_empty() {
            out.push('\n');
            writeln!(out, "Violations ({}):", outcome.violations.len()).unwrap();
            for v in &outcome.violations {
                writeln!(out, "  {v}").unwrap();
            }
        }

        if let Some(ref path) = outcome.saved_diff {
            out.push('\n');
            writeln!(out, "Diff saved to {}", path.display()).unwrap();
        }

        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, outcome: &CheckOutcome) -> String {
        let mut md = String::new();

        let line = outcome
            .delta
            .counters
            .get(&CoverageEntity::Line)
            .copied()
            .unwrap_or_default();
        if line.is_empty() {
            md.push_str("### Delta Coverage: n/a\n\n");
        } else {
            let pct = line.covered_ratio() * 100.0;
            writeln!(md, "### Delta Coverage: {pct:.1}%\n").unwrap();
        }

        let lines = outcome.diff_lines();
        let files = outcome.diff_files();
        write!(md, "**{lines}** changed lines across **{files}** files").unwrap();
        if !outcome.source.is_empty() {
            write!(md, " ({})", outcome.source).unwrap();
        }
        md.push('\n');

        md.push_str("\n| Entity | Delta | Full |\n");
        md.push_str("|:-------|------:|-----:|\n");
        for entity in CoverageEntity::ALL {
            writeln!(
                md,
                "| {} | {} | {} |",
                entity.as_str(),
                format_counter(&outcome.delta.counters, entity),
                format_counter(&outcome.full, entity),
            )
            .unwrap();
        }

        let files = files_with_misses(outcome);
        if files.is_empty() {
            md.push_str("\nAll changed lines are covered.\n");
        } else {
            md.push_str("\n<details>\n<summary>Missed lines</summary>\n\n");
            for f in files {
                let path = &f.path;
                let ranges = missed_ranges(outcome, f);
                writeln!(md, "**`{path}`**: {ranges}\n").unwrap();
            }
            md.push_str("</details>\n");
        }

        if !outcome.violations.is_empty() {
            md.push_str("\n#### Violations\n\n");
            for v in &outcome.violations {
                writeln!(md, "- {v}").unwrap();
            }
        }

        md
    }
}

/// JSON formatter, stamped with the time of formatting.
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, outcome: &CheckOutcome) -> String {
        let report = JsonReport::new(outcome, Utc::now());
        let mut json = serde_json::to_string_pretty(&report)
            .expect("JSON report is always serializable");
        json.push('\n');
        json
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    source: &'a str,
    diff: JsonDiff,
    full: JsonView<'a>,
    delta: JsonView<'a>,
    violations: &'a [Violation],
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_diff: Option<String>,
}

#[derive(Serialize)]
struct JsonDiff {
    files: usize,
    lines: usize,
}

#[derive(Serialize)]
struct JsonView<'a> {
    files: usize,
    counters: &'a Counters,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    file_details: Vec<JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: &'a str,
    counters: Counters,
    missed_lines: Vec<u32>,
}

impl<'a> JsonReport<'a> {
    fn new(outcome: &'a CheckOutcome, generated_at: DateTime<Utc>) -> Self {
        let file_details = outcome
            .delta
            .files
            .iter()
            .map(|f| JsonFile {
                path: &f.path,
                counters: f.counters(),
                missed_lines: f.missed_lines(),
            })
            .collect();

        JsonReport {
            generated_at: generated_at.to_rfc3339(),
            source: &outcome.source,
            diff: JsonDiff {
                files: outcome.diff_files(),
                lines: outcome.diff_lines(),
            },
            full: JsonView {
                files: outcome.full_files,
                counters: &outcome.full,
                file_details: Vec::new(),
            },
            delta: JsonView {
                files: outcome.delta.files.len(),
                counters: &outcome.delta.counters,
                file_details,
            },
            violations: &outcome.violations,
            saved_diff: outcome
                .saved_diff
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

fn format_counter(counters: &Counters, entity: CoverageEntity) -> String {
    match counters.get(&entity) {
        Some(c) if !c.is_empty() => {
            format!("{:.1}% ({}/{})", c.covered_ratio() * 100.0, c.covered, c.total())
        }
        _ => "n/a".to_string(),
    }
}

fn line_counter(file: &FileCoverage) -> CoverageCounter {
    file.counters()
        .get(&CoverageEntity::Line)
        .copied()
        .unwrap_or_default()
}

/// Delta files with at least one missed changed line, worst first.
fn files_with_misses(outcome: &CheckOutcome) -> Vec<&FileCoverage> {
    let mut files: Vec<&FileCoverage> = outcome
        .delta
        .files
        .iter()
        .filter(|f| f.lines.iter().any(|l| !l.is_covered()))
        .collect();
    files.sort_by(|a, b| {
        line_counter(a)
            .covered_ratio()
            .total_cmp(&line_counter(b).covered_ratio())
    });
    files
}

/// Missed changed lines of `file`, bridging over changed lines that have no
/// coverage record.
fn missed_ranges(outcome: &CheckOutcome, file: &FileCoverage) -> String {
    let instrumented: BTreeSet<u32> = file.lines.iter().map(|l| l.line_number).collect();
    let bridgeable: BTreeSet<u32> = outcome
        .index
        .resolve(&file.path)
        .map(|changed| changed.difference(&instrumented).copied().collect())
        .unwrap_or_default();
    format_line_ranges(&file.missed_lines(), &bridgeable)
}

/// Maximum number of consecutive lines that can be bridged when coalescing
/// missed ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging small
/// gaps made up only of `bridgeable` lines.
///
/// A gap between two missed lines is bridged only when:
/// 1. Every line in the gap is in `bridgeable`, AND
/// 2. The gap is at most [`MAX_BRIDGE_GAP`] lines wide.
///
/// `lines` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], bridgeable: &BTreeSet<u32>) -> Vec<(u32, u32)> {
    if lines.is_empty() {
        return Vec::new();
    }

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce_ranges requires sorted, deduplicated input"
    );

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut start = lines[0];
    let mut end = lines[0];

    for &line in &lines[1..] {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP && (end + 1..line).all(|l| bridgeable.contains(&l)) {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32], bridgeable: &BTreeSet<u32>) -> String {
    coalesce_ranges(lines, bridgeable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
