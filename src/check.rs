//! One delta-coverage run: pull the diff, build the full and diff-restricted
//! views of the coverage data, and evaluate the rules against the latter.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::diff::parse_diff;
use crate::error::DeltaCovError;
use crate::filter::{filter, FilteredCoverage};
use crate::index::ModifiedLinesIndex;
use crate::ingest;
use crate::model::{Counters, CoverageData};
use crate::source::{diff_source_factory, save_diff};
use crate::violation::{evaluate, Violation, ViolationRule};

/// Everything a report needs about one run.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Where the diff came from.
    pub source: String,
    /// Changed lines per file, as matched against coverage paths.
    pub index: ModifiedLinesIndex,
    /// Counters over every file in the coverage data.
    pub full: Counters,
    pub full_files: usize,
    /// Coverage restricted to the changed lines.
    pub delta: FilteredCoverage,
    pub violations: Vec<Violation>,
    /// Where the raw diff was saved, if requested.
    pub saved_diff: Option<PathBuf>,
}

impl CheckOutcome {
    pub fn diff_files(&self) -> usize {
        self.index.len()
    }

    pub fn diff_lines(&self) -> usize {
        self.index.total_lines()
    }
}

/// Compute both views and the violation list from already-loaded inputs.
/// Absolute coverage paths below `source_root` match repo-relative diff
/// paths.
pub fn analyze(
    diff_text: &str,
    data: &CoverageData,
    rules: &[ViolationRule],
    path_prefix: Option<&str>,
    source_root: Option<&Path>,
) -> crate::error::Result<CheckOutcome> {
    let diffs = parse_diff(diff_text)?;
    let mut index = ModifiedLinesIndex::build(&diffs);
    if let Some(root) = source_root {
        index = index.with_root(root);
    }
    if let Some(prefix) = path_prefix {
        index = index.with_path_prefix(prefix);
    }
    for (path, lines) in index.files() {
        info!("{}: {} modified lines", path, lines.len());
    }

    let delta = filter(data, &index);
    debug!(
        "{} files analyzed, {} excluded by the diff",
        delta.files.len(),
        delta.excluded_files
    );
    let violations = evaluate(rules, &delta.counters);

    Ok(CheckOutcome {
        source: String::new(),
        index,
        full: data.counters(),
        full_files: data.files.len(),
        delta,
        violations,
        saved_diff: None,
    })
}

/// Run a full check as configured, resolving relative paths against `root`.
pub fn run(config: &Config, root: &Path) -> Result<CheckOutcome> {
    config.validate()?;
    let rules = config.violations.rules()?;
    info!(
        "{} rules, fail on violation: {}",
        rules.len(),
        config.violations.fail_on_violation
    );

    let source = diff_source_factory(root, &config.diff)?;
    let description = source.source_description();
    debug!("diff source: {description}");
    let diff_text = source
        .pull_diff()
        .with_context(|| format!("Failed to obtain diff ({description})"))?;

    let saved_diff = if config.report.save_diff {
        Some(save_diff(&root.join(&config.report.dir), &diff_text)?)
    } else {
        None
    };

    let coverage_files: Vec<PathBuf> = config.coverage.files.iter().map(|f| root.join(f)).collect();
    let data = ingest::load_all(&coverage_files, config.coverage.format()?)?;

    let source_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut outcome = analyze(
        &diff_text,
        &data,
        &rules,
        config.coverage.path_prefix.as_deref(),
        Some(&source_root),
    )
    .with_context(|| format!("Failed to analyze diff from {description}"))?;
    outcome.source = description;
    outcome.saved_diff = saved_diff;
    Ok(outcome)
}

/// Turn violations into an error when failing is requested; otherwise only
/// log them.
pub fn enforce(violations: &[Violation], fail_on_violation: bool) -> crate::error::Result<()> {
    if violations.is_empty() {
        return Ok(());
    }
    warn!(
        "{} coverage violations found, fail on violation: {}",
        violations.len(),
        fail_on_violation
    );
    if !fail_on_violation {
        for violation in violations {
            warn!("{violation}");
        }
        return Ok(());
    }

    let details = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    Err(DeltaCovError::Violations {
        count: violations.len(),
        details,
    })
}
