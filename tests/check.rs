mod common;

use std::path::Path;
use std::process::Command;

use deltacov::check::{self, CheckOutcome};
use deltacov::config::Config;
use deltacov::error::DeltaCovError;
use deltacov::model::{CoverageCounter, CoverageEntity};

const FOO_JAVA: &str = "src/main/java/com/example/Foo.java";

fn run_config(dir: &Path, toml: &str) -> anyhow::Result<CheckOutcome> {
    let config = Config::from_toml(toml)?;
    check::run(&config, dir)
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Full run from a diff file and a JaCoCo report, with rules that fail.
#[test]
fn check_from_diff_file_reports_violations() {
    let dir = common::workspace();
    common::write(
        dir.path(),
        "changes.diff",
        &format!(
            "--- a/{FOO_JAVA}\n+++ b/{FOO_JAVA}\n@@ -10,2 +10,4 @@\n context\n+a\n+b\n context\n"
        ),
    );
    std::fs::copy(
        common::fixture("sample_jacoco.xml"),
        dir.path().join("jacoco.xml"),
    )
    .unwrap();

    let outcome = run_config(
        dir.path(),
        r#"
[diff]
file = "changes.diff"

[coverage]
files = ["jacoco.xml"]

[violations]
fail_on_violation = true
min_lines = 0.8
min_branches = 0.5

[[violations.rule]]
entity = "INSTRUCTION"
value = "missed_count"
min = 3
"#,
    )
    .unwrap();

    // Lines 11 and 12 of Foo.java changed.
    assert_eq!(outcome.diff_lines(), 2);
    assert_eq!(outcome.delta.files.len(), 1);
    assert_eq!(
        outcome.delta.counters[&CoverageEntity::Line],
        CoverageCounter::new(1, 1)
    );

    let names: Vec<&str> = outcome
        .violations
        .iter()
        .map(|v| v.entity_name.as_str())
        .collect();
    assert_eq!(names, vec!["LINE", "INSTRUCTION"]);

    let err = check::enforce(&outcome.violations, true).unwrap_err();
    assert!(matches!(err, DeltaCovError::Violations { count: 2, .. }));
    assert!(err.to_string().starts_with("Fail on violations: 2 found:\n[LINE]"));
}

/// A threshold keeps small changes from tripping ratio rules.
#[test]
fn check_entity_count_threshold_suppresses_rules() {
    let dir = common::workspace();
    common::write(
        dir.path(),
        "changes.diff",
        "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -2,0 +3,2 @@\n+a\n+b\n",
    );
    std::fs::copy(common::fixture("sample.lcov"), dir.path().join("lcov.info")).unwrap();

    let outcome = run_config(
        dir.path(),
        r#"
[diff]
file = "changes.diff"

[coverage]
files = ["lcov.info"]

[violations]
fail_if_coverage_less_than = 0.9
entity_count_threshold = 5
"#,
    )
    .unwrap();

    assert_eq!(
        outcome.delta.counters[&CoverageEntity::Line],
        CoverageCounter::new(2, 0)
    );
    assert!(outcome.violations.is_empty());
}

#[test]
fn check_requires_a_diff_source() {
    let dir = common::workspace();
    common::write(dir.path(), "lcov.info", "SF:a.rs\nDA:1,1\nend_of_record\n");

    let err = run_config(dir.path(), "[coverage]\nfiles = [\"lcov.info\"]\n").unwrap_err();
    assert!(
        err.to_string().contains("all are blank"),
        "{err:#}"
    );
}

#[test]
fn check_requires_resolvable_coverage_files() {
    let dir = common::workspace();
    common::write(dir.path(), "changes.diff", "");

    let err = run_config(
        dir.path(),
        "[diff]\nfile = \"changes.diff\"\n[coverage]\nfiles = [\"missing.xml\"]\n",
    )
    .unwrap_err();
    let err = err.downcast::<DeltaCovError>().unwrap();
    assert!(matches!(err, DeltaCovError::Config(_)), "{err}");
}

/// Only the root crate's `src/lib.rs` changed; the nested crate's file of the
/// same name stays out of the restricted view.
#[test]
fn check_ignores_same_named_file_in_nested_crate() {
    let dir = common::workspace();
    let root = dir.path().canonicalize().unwrap();
    common::write(
        &root,
        "changes.diff",
        "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,1 +1,2 @@\n a\n+b\n",
    );
    common::write(
        &root,
        "lcov.info",
        &format!(
            "SF:{root}/crates/foo/src/lib.rs\nDA:2,0\nend_of_record\n\
             SF:{root}/src/lib.rs\nDA:2,3\nend_of_record\n",
            root = root.display()
        ),
    );

    let outcome = run_config(
        &root,
        "[diff]\nfile = \"changes.diff\"\n[coverage]\nfiles = [\"lcov.info\"]\n",
    )
    .unwrap();

    assert_eq!(outcome.delta.files.len(), 1);
    assert_eq!(outcome.delta.excluded_files, 1);
    assert_eq!(
        outcome.delta.counters[&CoverageEntity::Line],
        CoverageCounter::new(0, 1)
    );
}

/// Diff pulled from `git diff HEAD` in a scratch repository.
#[test]
fn check_from_git_diff() {
    let dir = common::workspace();
    let root = dir.path();
    if !git(root, &["init", "-q"]) {
        eprintln!("git unavailable, skipping");
        return;
    }
    assert!(git(root, &["config", "user.email", "dev@example.com"]));
    assert!(git(root, &["config", "user.name", "dev"]));
    assert!(git(root, &["config", "commit.gpgsign", "false"]));

    common::write(root, "src/lib.rs", "fn a() {}\nfn b() {}\n");
    assert!(git(root, &["add", "."]));
    assert!(git(root, &["commit", "-q", "-m", "init"]));

    common::write(root, "src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\nfn d() {}\n");
    // Absolute path below the root, as a coverage tool run in place writes it.
    common::write(
        root,
        "lcov.info",
        &format!(
            "SF:{}/src/lib.rs\nDA:1,1\nDA:3,2\nDA:4,0\nend_of_record\n",
            root.canonicalize().unwrap().display()
        ),
    );

    let outcome = run_config(
        root,
        r#"
[diff]
git = "HEAD"

[coverage]
files = ["lcov.info"]

[violations]
min_lines = 0.5

[report]
dir = "out"
save_diff = true
"#,
    )
    .unwrap();

    assert_eq!(outcome.source, "Git: diff HEAD");
    assert!(outcome.index.lookup("src/lib.rs", 3));
    assert!(outcome.index.lookup("src/lib.rs", 4));
    assert_eq!(
        outcome.delta.counters[&CoverageEntity::Line],
        CoverageCounter::new(1, 1)
    );
    assert!(outcome.violations.is_empty());

    let saved = std::fs::read_to_string(root.join("out/diff.patch")).unwrap();
    assert!(saved.contains("+fn c() {}"));
}
