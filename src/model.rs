//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageData`, which the filter then
//! restricts to the lines touched by a diff.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// The unit being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoverageEntity {
    Instruction,
    Branch,
    Line,
}

impl CoverageEntity {
    pub const ALL: [CoverageEntity; 3] = [
        CoverageEntity::Instruction,
        CoverageEntity::Branch,
        CoverageEntity::Line,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageEntity::Instruction => "INSTRUCTION",
            CoverageEntity::Branch => "BRANCH",
            CoverageEntity::Line => "LINE",
        }
    }
}

impl fmt::Display for CoverageEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A missed/covered pair for one entity at some scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageCounter {
    pub missed: u64,
    pub covered: u64,
}

impl CoverageCounter {
    pub const EMPTY: CoverageCounter = CoverageCounter {
        missed: 0,
        covered: 0,
    };

    #[must_use]
    pub fn new(missed: u64, covered: u64) -> Self {
        Self { missed, covered }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.missed.saturating_add(self.covered)
    }

    #[must_use]
    pub fn covered_ratio(&self) -> f64 {
        rate(self.covered, self.total())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Component-wise `self <= other`.
    #[must_use]
    pub fn is_within(&self, other: &CoverageCounter) -> bool {
        self.missed <= other.missed && self.covered <= other.covered
    }

    /// Combine the same counter observed by two separate runs: the covered
    /// count is the best of both over the larger population.
    #[must_use]
    pub fn merged(&self, other: &CoverageCounter) -> CoverageCounter {
        let total = self.total().max(other.total());
        let covered = self.covered.max(other.covered).min(total);
        CoverageCounter {
            missed: total - covered,
            covered,
        }
    }
}

impl std::ops::AddAssign for CoverageCounter {
    fn add_assign(&mut self, rhs: Self) {
        self.missed = self.missed.saturating_add(rhs.missed);
        self.covered = self.covered.saturating_add(rhs.covered);
    }
}

/// Counters keyed by entity. An absent entity means no data.
pub type Counters = BTreeMap<CoverageEntity, CoverageCounter>;

/// Tally INSTRUCTION, BRANCH and LINE counters over a set of line records.
/// Every entity is present in the result, possibly with an empty counter.
pub fn tally<'a>(lines: impl IntoIterator<Item = &'a LineCoverage>) -> Counters {
    let mut instructions = CoverageCounter::EMPTY;
    let mut branches = CoverageCounter::EMPTY;
    let mut line_counter = CoverageCounter::EMPTY;

    for line in lines {
        instructions += line.instructions;
        branches += line.branches;
        if line.is_covered() {
            line_counter.covered += 1;
        } else {
            line_counter.missed += 1;
        }
    }

    Counters::from([
        (CoverageEntity::Instruction, instructions),
        (CoverageEntity::Branch, branches),
        (CoverageEntity::Line, line_counter),
    ])
}

/// A single instrumentable line, with the instruction and branch counts
/// attributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
    pub instructions: CoverageCounter,
    pub branches: CoverageCounter,
}

impl LineCoverage {
    /// A line carrying only a hit count (formats without instruction data).
    pub fn with_hits(line_number: u32, hit_count: u64) -> Self {
        Self {
            line_number,
            hit_count,
            instructions: CoverageCounter::EMPTY,
            branches: CoverageCounter::EMPTY,
        }
    }

    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.hit_count > 0
    }
}

/// Coverage data for a single source file (compilation unit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn counters(&self) -> Counters {
        tally(&self.lines)
    }

    pub fn missed_lines(&self) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|l| !l.is_covered())
            .map(|l| l.line_number)
            .collect()
    }
}

/// The complete result of parsing one or more coverage files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate counters over every file.
    pub fn counters(&self) -> Counters {
        tally(self.files.iter().flat_map(|f| &f.lines))
    }

    /// Merge another dataset into this one, keyed by file path and line
    /// number. Hit counts are summed; instruction and branch counters are
    /// combined with [`CoverageCounter::merged`].
    pub fn merge(&mut self, other: CoverageData) {
        for file in other.files {
            match self.files.iter_mut().find(|f| f.path == file.path) {
                Some(existing) => merge_lines(existing, file.lines),
                None => self.files.push(file),
            }
        }
    }
}

fn merge_lines(target: &mut FileCoverage, lines: Vec<LineCoverage>) {
    let mut by_number: BTreeMap<u32, LineCoverage> = target
        .lines
        .drain(..)
        .map(|l| (l.line_number, l))
        .collect();

    for line in lines {
        by_number
            .entry(line.line_number)
            .and_modify(|existing| {
                existing.hit_count = existing.hit_count.saturating_add(line.hit_count);
                existing.instructions = existing.instructions.merged(&line.instructions);
                existing.branches = existing.branches.merged(&line.branches);
            })
            .or_insert(line);
    }

    target.lines = by_number.into_values().collect();
}
