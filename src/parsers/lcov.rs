/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<absolute path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
///   LF/LH/BRF/BRH/FN/FNDA/FNF/FNH: summaries and functions, ignored
///   end_of_record
///
/// LCOV has no notion of instructions, so INSTRUCTION counters stay empty.
/// Branch arms are folded into a per-line branch counter. `geninfo` writes
/// BRDA records before DA records, so both are collected per file and joined
/// when the record ends.
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::{CoverageParser, Format};
use crate::error::{DeltaCovError, Result};
use crate::model::*;

/// LCOV format parser.
pub struct LcovParser;

impl CoverageParser for LcovParser {
    fn format(&self) -> Format {
        Format::Lcov
    }

    fn can_parse(&self, path: &Path, content: &[u8]) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_lowercase();
            if ext == "info" || ext == "lcov" {
                return true;
            }
        }

        // Content-based: lines starting with SF: and DA:/FN:
        let head = super::sniff_head(content);
        let has_sf = head.lines().any(|l| l.starts_with("SF:"));
        let has_da_or_fn = head
            .lines()
            .any(|l| l.starts_with("DA:") || l.starts_with("FN:"));
        has_sf && has_da_or_fn
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Lines and branch arms of the record being read.
struct Record {
    path: String,
    lines: BTreeMap<u32, u64>,
    branches: BTreeMap<u32, CoverageCounter>,
}

impl Record {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            lines: BTreeMap::new(),
            branches: BTreeMap::new(),
        }
    }

    fn finish(mut self) -> FileCoverage {
        let mut file = FileCoverage::new(self.path);
        for (line_number, hit_count) in self.lines {
            let mut line = LineCoverage::with_hits(line_number, hit_count);
            if let Some(branches) = self.branches.remove(&line_number) {
                line.branches = branches;
            }
            file.lines.push(line);
        }
        if !self.branches.is_empty() {
            debug!(
                "{}: dropping branch data for {} lines without DA records",
                file.path,
                self.branches.len()
            );
        }
        file
    }
}

/// Parse LCOV format coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let text = std::str::from_utf8(input)
        .map_err(|e| DeltaCovError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;

    let mut data = CoverageData::new();
    let mut current: Option<Record> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(record) = current.take() {
                data.files.push(record.finish());
            }
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            continue; // Skip lines we don't understand
        };

        match tag {
            "SF" => {
                if let Some(record) = current.replace(Record::new(value)) {
                    data.files.push(record.finish());
                }
            }
            "DA" => {
                // Negative counts mark non-instrumentable lines in some
                // instrumenters; skip those.
                if let Some(record) = current.as_mut() {
                    let parts: Vec<&str> = value.splitn(3, ',').collect();
                    if parts.len() >= 2 {
                        if let (Ok(line_number), Ok(count)) =
                            (parts[0].parse::<u32>(), parts[1].parse::<i64>())
                        {
                            if count >= 0 {
                                let hits = record.lines.entry(line_number).or_insert(0);
                                *hits = hits.saturating_add(count as u64);
                            }
                        }
                    }
                }
            }
            "BRDA" => {
                if let Some(record) = current.as_mut() {
                    let parts: Vec<&str> = value.splitn(4, ',').collect();
                    if parts.len() == 4 {
                        if let Ok(line_number) = parts[0].parse::<u32>() {
                            let taken = if parts[3] == "-" {
                                0
                            } else {
                                parts[3].parse::<u64>().unwrap_or(0)
                            };
                            let counter = record.branches.entry(line_number).or_default();
                            if taken > 0 {
                                counter.covered += 1;
                            } else {
                                counter.missed += 1;
                            }
                        }
                    }
                }
            }
            // TN, FN, FNDA, LF, LH, BRF, BRH and friends carry nothing we use.
            _ => {}
        }
    }

    // Handle case where file ends without end_of_record
    if let Some(record) = current.take() {
        data.files.push(record.finish());
    }

    Ok(data)
}
