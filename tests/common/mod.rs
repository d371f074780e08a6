#![allow(dead_code)]

use std::path::{Path, PathBuf};

use deltacov::model::{CoverageCounter, LineCoverage};
use tempfile::TempDir;

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Create a temporary working directory. The caller must hold onto the
/// `TempDir` to keep it alive.
pub fn workspace() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Write `contents` to `dir/name`, creating parent directories.
pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// A line record with JaCoCo-style counters.
pub fn line(nr: u32, mi: u64, ci: u64, mb: u64, cb: u64) -> LineCoverage {
    LineCoverage {
        line_number: nr,
        hit_count: ci,
        instructions: CoverageCounter::new(mi, ci),
        branches: CoverageCounter::new(mb, cb),
    }
}
