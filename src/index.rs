//! Changed line numbers per file, built once from a parsed diff.
//!
//! Diff paths are repo-relative (`src/main/java/com/x/Foo.java`) while
//! coverage tools report paths relative to a source root
//! (`com/x/Foo.java`) or absolute (`/ci/work/src/lib.rs`). Absolute paths
//! under the source root are made relative to it first. Lookups then try an
//! exact match on the normalized path, and failing that, diff paths that end
//! with the coverage path on a segment boundary.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;

use crate::diff::FileDiff;

/// Immutable map from normalized file path to the set of changed lines
/// (new-revision numbering).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedLinesIndex {
    files: BTreeMap<String, BTreeSet<u32>>,
    /// Normalized directory stripped from absolute coverage paths.
    root: Option<String>,
}

impl ModifiedLinesIndex {
    /// Aggregate added lines per new path. Files that end up with no changed
    /// lines (deletions, binaries, pure renames) are left out entirely.
    pub fn build(diffs: &[FileDiff]) -> Self {
        let mut files: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for diff in diffs {
            let Some(path) = diff.new_path.as_deref() else {
                continue;
            };
            let added: BTreeSet<u32> = diff.added_lines().collect();
            if added.is_empty() {
                continue;
            }
            files.entry(normalize_path(path)).or_default().extend(added);
        }

        for (path, lines) in &files {
            debug!("File {} has {} modified lines", path, lines.len());
        }

        Self { files, root: None }
    }

    /// Build directly from a path → lines map.
    pub fn from_map<I, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, L)>,
        L: IntoIterator<Item = u32>,
    {
        let mut files: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for (path, lines) in entries {
            files.entry(normalize_path(&path)).or_default().extend(lines);
        }
        files.retain(|_, lines| !lines.is_empty());
        Self { files, root: None }
    }

    /// Prepend a directory to every path, for coverage data rooted above
    /// the diff's root.
    #[must_use]
    pub fn with_path_prefix(self, prefix: &str) -> Self {
        let prefix = normalize_path(prefix);
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return self;
        }
        let files = self
            .files
            .into_iter()
            .map(|(path, lines)| (format!("{prefix}/{path}"), lines))
            .collect();
        Self {
            files,
            root: self.root,
        }
    }

    /// Directory that absolute coverage paths are made relative to.
    #[must_use]
    pub fn with_root(mut self, root: &Path) -> Self {
        let root = normalize_path(&root.to_string_lossy());
        let root = root.trim_end_matches('/');
        self.root = (!root.is_empty()).then(|| root.to_string());
        self
    }

    /// Every diff entry matching `path`, best first: the exact entry alone
    /// if there is one, else all entries ending with `path` in key order.
    pub fn candidates(&self, path: &str) -> Vec<(&str, &BTreeSet<u32>)> {
        let path = self.relative(path);
        if let Some((key, lines)) = self.files.get_key_value(&path) {
            return vec![(key.as_str(), lines)];
        }
        self.files
            .iter()
            .filter(|(key, _)| is_segment_suffix(key, &path))
            .map(|(key, lines)| (key.as_str(), lines))
            .collect()
    }

    /// Changed lines of the diff entry matching `path`, if any. When several
    /// entries match, the first in key order wins.
    pub fn resolve(&self, path: &str) -> Option<&BTreeSet<u32>> {
        self.candidates(path).first().map(|(_, lines)| *lines)
    }

    /// Whether `line` of `path` was changed.
    pub fn lookup(&self, path: &str, line: u32) -> bool {
        self.resolve(path).is_some_and(|lines| lines.contains(&line))
    }

    /// Whether `path` participates in the diff at all.
    pub fn has_any_entry(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// `path` normalized, with the root stripped when it lies below it.
    fn relative(&self, path: &str) -> String {
        let path = normalize_path(path);
        let stripped = self.root.as_deref().and_then(|root| {
            path.strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty())
        });
        match stripped {
            Some(rest) => rest.to_string(),
            None => path,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &BTreeSet<u32>)> {
        self.files.iter().map(|(path, lines)| (path.as_str(), lines))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of changed lines across all files.
    pub fn total_lines(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }
}

/// Forward slashes, no leading `./`, no repeated separators.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut normalized = String::with_capacity(path.len());
    for (i, segment) in path.split('/').enumerate() {
        if segment.is_empty() && i > 0 {
            continue;
        }
        if segment == "." {
            continue;
        }
        if !normalized.is_empty() && !normalized.ends_with('/') {
            normalized.push('/');
        }
        if segment.is_empty() {
            // Leading slash of an absolute path.
            normalized.push('/');
        } else {
            normalized.push_str(segment);
        }
    }
    normalized
}

/// `longer` ends with `/` + `suffix`.
fn is_segment_suffix(longer: &str, suffix: &str) -> bool {
    !suffix.is_empty()
        && longer.len() > suffix.len()
        && longer.ends_with(suffix)
        && longer.as_bytes()[longer.len() - suffix.len() - 1] == b'/'
}
