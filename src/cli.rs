//! Command handler functions for the deltacov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::check::{self, CheckOutcome};
use crate::config::{Config, DiffSourceConfig};
use crate::diff::parse_diff;
use crate::index::ModifiedLinesIndex;
use crate::report::{self, JsonFormatter, MarkdownFormatter, ReportFormatter, TextFormatter};
use crate::source::diff_source_factory;

/// Output style for the `check` command.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
    Json,
}

impl Style {
    pub fn formatter(self) -> &'static dyn ReportFormatter {
        match self {
            Style::Text => &TextFormatter,
            Style::Markdown => &MarkdownFormatter,
            Style::Json => &JsonFormatter,
        }
    }
}

/// Diff source flags. Any of them replaces the `[diff]` section of the
/// config file as a whole.
#[derive(Args, Debug, Clone, Default)]
pub struct DiffArgs {
    /// Read the diff from a file ("-" for stdin).
    #[arg(long)]
    pub diff_file: Option<String>,

    /// Fetch the diff from a URL.
    #[arg(long)]
    pub diff_url: Option<String>,

    /// Run `git diff <BASE>` in the root directory, e.g. "origin/main".
    #[arg(long, value_name = "BASE")]
    pub git_diff: Option<String>,
}

impl DiffArgs {
    pub fn apply_to(&self, diff: &mut DiffSourceConfig) {
        if self.diff_file.is_some() || self.diff_url.is_some() || self.git_diff.is_some() {
            *diff = DiffSourceConfig {
                file: self.diff_file.clone(),
                url: self.diff_url.clone(),
                git: self.git_diff.clone(),
            };
        }
    }
}

/// Flags of the `check` command that override config file values.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    /// Coverage file(s) to check (JaCoCo XML or LCOV). Replaces the
    /// configured list.
    #[arg(long = "coverage", value_name = "FILE")]
    pub coverage: Vec<PathBuf>,

    /// Override format detection (jacoco, lcov).
    #[arg(long)]
    pub format: Option<String>,

    /// Path prefix to prepend to diff paths for matching against coverage
    /// data paths.
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Minimum covered ratio of changed instructions (0.0-1.0).
    #[arg(long)]
    pub min_instructions: Option<f64>,

    /// Minimum covered ratio of changed branches (0.0-1.0).
    #[arg(long)]
    pub min_branches: Option<f64>,

    /// Minimum covered ratio of changed lines (0.0-1.0).
    #[arg(long)]
    pub min_lines: Option<f64>,

    /// Minimum covered ratio for every entity without its own minimum.
    #[arg(long)]
    pub min_coverage: Option<f64>,

    /// Exit with a failure status when any rule is violated.
    #[arg(long)]
    pub fail_on_violation: bool,

    /// Directory for saved artifacts.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Save the raw diff to <REPORT_DIR>/diff.patch.
    #[arg(long)]
    pub save_diff: bool,
}

impl CheckArgs {
    pub fn apply_to(&self, config: &mut Config) {
        self.diff.apply_to(&mut config.diff);

        if !self.coverage.is_empty() {
            config.coverage.files = self.coverage.clone();
        }
        if self.format.is_some() {
            config.coverage.format = self.format.clone();
        }
        if self.path_prefix.is_some() {
            config.coverage.path_prefix = self.path_prefix.clone();
        }

        let violations = &mut config.violations;
        violations.min_instructions = self.min_instructions.or(violations.min_instructions);
        violations.min_branches = self.min_branches.or(violations.min_branches);
        violations.min_lines = self.min_lines.or(violations.min_lines);
        violations.fail_if_coverage_less_than = self
            .min_coverage
            .or(violations.fail_if_coverage_less_than);
        violations.fail_on_violation |= self.fail_on_violation;

        if let Some(ref dir) = self.report_dir {
            config.report.dir = dir.clone();
        }
        config.report.save_diff |= self.save_diff;
    }
}

/// Run a check and render it. Violations are returned in the outcome for the
/// caller to enforce.
pub fn cmd_check(config: &Config, root: &Path, style: Style) -> Result<(String, CheckOutcome)> {
    let outcome = check::run(config, root)?;
    let output = style.formatter().format(&outcome);
    Ok((output, outcome))
}

/// Print the changed lines per file of the configured diff.
pub fn cmd_modified_lines(
    diff: &DiffSourceConfig,
    root: &Path,
    path_prefix: Option<&str>,
) -> Result<String> {
    let source = diff_source_factory(root, diff)?;
    let description = source.source_description();
    let text = source
        .pull_diff()
        .with_context(|| format!("Failed to obtain diff ({description})"))?;
    let diffs = parse_diff(&text).with_context(|| format!("Failed to parse diff from {description}"))?;

    let mut index = ModifiedLinesIndex::build(&diffs);
    if let Some(prefix) = path_prefix {
        index = index.with_path_prefix(prefix);
    }

    if index.is_empty() {
        return Ok("No changed lines found in diff.\n".to_string());
    }

    let mut out = String::new();
    for (path, lines) in index.files() {
        let numbers: Vec<u32> = lines.iter().copied().collect();
        writeln!(
            out,
            "{path} ({} lines): {}",
            numbers.len(),
            report::format_line_ranges(&numbers, &Default::default())
        )
        .unwrap();
    }
    writeln!(
        out,
        "{} lines changed across {} files",
        index.total_lines(),
        index.len()
    )
    .unwrap();
    Ok(out)
}
