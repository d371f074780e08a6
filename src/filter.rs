//! Restrict full coverage data to the lines changed by a diff.
//!
//! Two gates apply. A file is analyzed at all only if the index has an
//! entry for its path; files outside the diff contribute nothing to any
//! counter. Within a surviving file, only line records whose line number was
//! changed are kept, and INSTRUCTION/BRANCH/LINE counters are recomputed from
//! those records alone.
use tracing::{debug, warn};

use crate::index::ModifiedLinesIndex;
use crate::model::{tally, Counters, CoverageData, FileCoverage};

/// The diff-restricted view of a coverage dataset.
#[derive(Debug, Clone, Default)]
pub struct FilteredCoverage {
    /// Files that participate in the diff, holding only changed lines.
    pub files: Vec<FileCoverage>,
    /// Counters recomputed over the surviving lines.
    pub counters: Counters,
    /// Number of files dropped by the file-level gate.
    pub excluded_files: usize,
}

pub fn filter(data: &CoverageData, index: &ModifiedLinesIndex) -> FilteredCoverage {
    let mut files = Vec::new();
    let mut excluded_files = 0;

    for file in &data.files {
        let candidates = index.candidates(&file.path);
        let Some(&(matched, changed)) = candidates.first() else {
            excluded_files += 1;
            continue;
        };
        if candidates.len() > 1 {
            let keys: Vec<&str> = candidates.iter().map(|(key, _)| *key).collect();
            warn!(
                "{} matches several changed files ({}), using {}",
                file.path,
                keys.join(", "),
                matched
            );
        }

        let lines: Vec<_> = file
            .lines
            .iter()
            .filter(|l| changed.contains(&l.line_number))
            .cloned()
            .collect();
        debug!(
            "{}: {} of {} instrumentable lines changed",
            file.path,
            lines.len(),
            file.lines.len()
        );
        files.push(FileCoverage {
            path: file.path.clone(),
            lines,
        });
    }

    let counters = tally(files.iter().flat_map(|f| &f.lines));

    FilteredCoverage {
        files,
        counters,
        excluded_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageCounter, CoverageEntity, LineCoverage};

    fn line(nr: u32, mi: u64, ci: u64, mb: u64, cb: u64) -> LineCoverage {
        LineCoverage {
            line_number: nr,
            hit_count: ci,
            instructions: CoverageCounter::new(mi, ci),
            branches: CoverageCounter::new(mb, cb),
        }
    }

    fn sample() -> CoverageData {
        CoverageData {
            files: vec![
                FileCoverage {
                    path: "com/example/Foo.java".to_string(),
                    lines: vec![
                        line(3, 0, 3, 0, 0),
                        line(10, 0, 5, 0, 0),
                        line(11, 0, 5, 1, 1),
                        line(12, 2, 0, 0, 0),
                        line(15, 0, 3, 0, 0),
                    ],
                },
                FileCoverage {
                    path: "com/example/Bar.java".to_string(),
                    lines: vec![line(1, 4, 0, 2, 0), line(2, 0, 1, 0, 0)],
                },
            ],
        }
    }

    #[test]
    fn test_restricts_to_changed_lines() {
        let index = ModifiedLinesIndex::from_map([(
            "src/main/java/com/example/Foo.java".to_string(),
            vec![11, 12, 13],
        )]);

        let filtered = filter(&sample(), &index);

        assert_eq!(filtered.files.len(), 1);
        assert_eq!(filtered.excluded_files, 1);
        let numbers: Vec<u32> = filtered.files[0].lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![11, 12]);

        let c = &filtered.counters;
        assert_eq!(c[&CoverageEntity::Instruction], CoverageCounter::new(2, 5));
        assert_eq!(c[&CoverageEntity::Branch], CoverageCounter::new(1, 1));
        assert_eq!(c[&CoverageEntity::Line], CoverageCounter::new(1, 1));
    }

    #[test]
    fn test_file_outside_diff_contributes_nothing() {
        let index = ModifiedLinesIndex::from_map([("x.bin".to_string(), vec![1])]);
        let filtered = filter(&sample(), &index);
        assert!(filtered.files.is_empty());
        assert_eq!(filtered.excluded_files, 2);
        assert!(filtered.counters.values().all(CoverageCounter::is_empty));
    }

    #[test]
    fn test_changed_lines_without_instrumentation_keep_file_in_view() {
        let index = ModifiedLinesIndex::from_map([("com/example/Bar.java".to_string(), vec![7])]);
        let filtered = filter(&sample(), &index);
        assert_eq!(filtered.files.len(), 1);
        assert!(filtered.files[0].lines.is_empty());
        assert_eq!(filtered.counters[&CoverageEntity::Line], CoverageCounter::EMPTY);
    }

    #[test]
    fn test_restricted_counters_never_exceed_full() {
        let data = sample();
        let index = ModifiedLinesIndex::from_map([
            ("com/example/Foo.java".to_string(), vec![3, 11, 99]),
            ("com/example/Bar.java".to_string(), vec![1, 2]),
        ]);
        let full = data.counters();
        let filtered = filter(&data, &index);
        for entity in CoverageEntity::ALL {
            assert!(filtered.counters[&entity].is_within(&full[&entity]));
        }
    }
}
