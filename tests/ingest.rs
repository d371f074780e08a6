mod common;

use std::path::PathBuf;

use deltacov::error::DeltaCovError;
use deltacov::ingest;
use deltacov::model::{CoverageCounter, CoverageEntity};
use deltacov::parsers::Format;

/// Read from disk and auto-detect the format.
#[test]
fn load_lcov_file_auto_detect() {
    let (data, format) = ingest::load(&common::fixture("sample.lcov"), None).unwrap();

    assert_eq!(format, Format::Lcov);
    assert_eq!(data.files.len(), 2);
    assert_eq!(
        data.counters()[&CoverageEntity::Line],
        CoverageCounter::new(3, 4)
    );
}

#[test]
fn load_jacoco_file_auto_detect() {
    let (data, format) = ingest::load(&common::fixture("sample_jacoco.xml"), None).unwrap();

    assert_eq!(format, Format::Jacoco);
    let counters = data.counters();
    assert_eq!(
        counters[&CoverageEntity::Instruction],
        CoverageCounter::new(6, 18)
    );
    assert_eq!(counters[&CoverageEntity::Branch], CoverageCounter::new(1, 1));
    assert_eq!(counters[&CoverageEntity::Line], CoverageCounter::new(2, 5));
}

/// Content sniffing works without a telling extension.
#[test]
fn load_detects_lcov_by_content() {
    let dir = common::workspace();
    let path = common::write(dir.path(), "coverage.txt", "TN:\nSF:/src/a.rs\nDA:1,1\nend_of_record\n");

    let (data, format) = ingest::load(&path, None).unwrap();
    assert_eq!(format, Format::Lcov);
    assert_eq!(data.files[0].path, "/src/a.rs");
}

#[test]
fn load_unknown_format() {
    let dir = common::workspace();
    let path = common::write(dir.path(), "notes.txt", "just some text\n");

    let err = ingest::load(&path, None).unwrap_err();
    assert!(matches!(err, DeltaCovError::UnknownFormat), "{err}");
}

#[test]
fn load_with_format_override() {
    let dir = common::workspace();
    let path = common::write(dir.path(), "report.dat", "SF:/src/a.rs\nDA:1,0\nend_of_record\n");

    let (_, format) = ingest::load(&path, Some(Format::Lcov)).unwrap();
    assert_eq!(format, Format::Lcov);

    // Forcing the XML parser finds no source files in LCOV text.
    let (data, format) = ingest::load(&path, Some(Format::Jacoco)).unwrap();
    assert_eq!(format, Format::Jacoco);
    assert!(data.files.is_empty());
}

/// Two runs over the same file: hit counts add up, a line missed in one run
/// and covered in the other counts as covered.
#[test]
fn load_all_merges_files() {
    let dir = common::workspace();
    let unit = common::write(dir.path(), "unit.info", "SF:src/a.rs\nDA:1,1\nDA:2,0\nend_of_record\n");
    let integration = common::write(
        dir.path(),
        "integration.info",
        "SF:src/a.rs\nDA:2,3\nDA:3,0\nend_of_record\nSF:src/b.rs\nDA:1,1\nend_of_record\n",
    );

    let data = ingest::load_all(&[unit, integration], None).unwrap();

    assert_eq!(data.files.len(), 2);
    let a = data.files.iter().find(|f| f.path == "src/a.rs").unwrap();
    let hits: Vec<(u32, u64)> = a.lines.iter().map(|l| (l.line_number, l.hit_count)).collect();
    assert_eq!(hits, vec![(1, 1), (2, 3), (3, 0)]);
}

#[test]
fn load_all_skips_missing_files() {
    let dir = common::workspace();
    let present = common::write(dir.path(), "lcov.info", "SF:src/a.rs\nDA:1,1\nend_of_record\n");

    let data = ingest::load_all(&[dir.path().join("absent.info"), present], None).unwrap();
    assert_eq!(data.files.len(), 1);
}

#[test]
fn load_all_without_any_existing_file_is_config_error() {
    let err = ingest::load_all(&[PathBuf::from("/nonexistent/jacoco.xml")], None).unwrap_err();
    assert!(matches!(err, DeltaCovError::Config(_)), "{err}");
}
