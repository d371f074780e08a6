//! Parse a unified diff into per-file hunks.
//!
//! The parser is a line-oriented state machine. Between hunks it looks for
//! file headers (`diff --git`, `---`/`+++`, git extended headers, binary
//! markers) and hunk headers. Inside a hunk, lines are classified purely by
//! their first character and the hunk closes as soon as the old and new line
//! counts declared by its header have been consumed. Because of that, a
//! removed line that happens to read `--- foo` is still a removed line.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DeltaCovError, Result};

/// `@@ -old_start[,old_count] +new_start[,new_count] @@ [section heading]`
static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk header regex")
});

const DEV_NULL: &str = "/dev/null";

/// What happened to a file between the two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Binary,
}

/// One line of a hunk, tagged with the line number(s) it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkLine {
    Context { old_line: u32, new_line: u32 },
    Added { new_line: u32 },
    Removed { old_line: u32 },
}

impl HunkLine {
    /// Line number in the new revision, if the line exists there.
    pub fn new_line(&self) -> Option<u32> {
        match *self {
            HunkLine::Context { new_line, .. } | HunkLine::Added { new_line } => Some(new_line),
            HunkLine::Removed { .. } => None,
        }
    }

    /// Line number in the old revision, if the line existed there.
    pub fn old_line(&self) -> Option<u32> {
        match *self {
            HunkLine::Context { old_line, .. } | HunkLine::Removed { old_line } => Some(old_line),
            HunkLine::Added { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<HunkLine>,
}

impl DiffHunk {
    /// New-revision line numbers of every added line, in order.
    pub fn added_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().filter_map(|l| match *l {
            HunkLine::Added { new_line } => Some(new_line),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path in the old revision; `None` for pure additions.
    pub old_path: Option<String>,
    /// Path in the new revision; `None` for deletions.
    pub new_path: Option<String>,
    pub hunks: Vec<DiffHunk>,
    pub kind: ChangeKind,
}

impl FileDiff {
    /// New-revision line numbers of every added line across all hunks.
    pub fn added_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.hunks.iter().flat_map(DiffHunk::added_lines)
    }
}

/// A hunk whose declared size has not been fully consumed yet.
struct OpenHunk {
    hunk: DiffHunk,
    old_remaining: u32,
    new_remaining: u32,
    next_old: u32,
    next_new: u32,
}

impl OpenHunk {
    fn open(old_start: u32, old_count: u32, new_start: u32, new_count: u32) -> Self {
        Self {
            hunk: DiffHunk {
                old_start,
                old_count,
                new_start,
                new_count,
                lines: Vec::new(),
            },
            old_remaining: old_count,
            new_remaining: new_count,
            next_old: old_start,
            next_new: new_start,
        }
    }

    fn is_complete(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    /// Consume one hunk body line. Returns the reason on failure.
    fn consume(&mut self, line: &str) -> std::result::Result<(), &'static str> {
        let tagged = match line.as_bytes().first() {
            Some(b' ') | None => {
                if self.old_remaining == 0 || self.new_remaining == 0 {
                    return Err("hunk exceeds declared size");
                }
                let tagged = HunkLine::Context {
                    old_line: self.next_old,
                    new_line: self.next_new,
                };
                self.advance_old();
                self.advance_new();
                tagged
            }
            Some(b'-') => {
                if self.old_remaining == 0 {
                    return Err("hunk exceeds declared size");
                }
                let tagged = HunkLine::Removed {
                    old_line: self.next_old,
                };
                self.advance_old();
                tagged
            }
            Some(b'+') => {
                if self.new_remaining == 0 {
                    return Err("hunk exceeds declared size");
                }
                let tagged = HunkLine::Added {
                    new_line: self.next_new,
                };
                self.advance_new();
                tagged
            }
            Some(_) => return Err("hunk ended before declared size"),
        };
        self.hunk.lines.push(tagged);
        Ok(())
    }

    fn advance_old(&mut self) {
        self.old_remaining -= 1;
        self.next_old = self.next_old.saturating_add(1);
    }

    fn advance_new(&mut self) {
        self.new_remaining -= 1;
        self.next_new = self.next_new.saturating_add(1);
    }
}

enum State {
    AwaitingFileHeader,
    InHunk(OpenHunk),
}

/// A file entry under construction.
struct PendingFile {
    diff: FileDiff,
    /// Whether `---`/`+++` headers have been seen for this entry.
    has_file_headers: bool,
}

impl PendingFile {
    fn new(old_path: Option<String>, new_path: Option<String>) -> Self {
        Self {
            diff: FileDiff {
                old_path,
                new_path,
                hunks: Vec::new(),
                kind: ChangeKind::Modified,
            },
            has_file_headers: false,
        }
    }
}

struct DiffParser {
    files: Vec<FileDiff>,
    current: Option<PendingFile>,
    state: State,
}

/// Parse unified diff text into one [`FileDiff`] per file, in input order.
///
/// Fails with [`DeltaCovError::MalformedDiff`] when a hunk header is
/// malformed or a hunk's body does not match its declared size. No partial
/// result is returned.
pub fn parse_diff(text: &str) -> Result<Vec<FileDiff>> {
    let mut parser = DiffParser {
        files: Vec::new(),
        current: None,
        state: State::AwaitingFileHeader,
    };

    let mut lines = text.lines().enumerate().peekable();
    while let Some((idx, line)) = lines.next() {
        let line_number = idx + 1;

        if line.starts_with('\\') {
            // "\ No newline at end of file" is metadata, never a hunk line.
            continue;
        }

        if let State::InHunk(open) = &mut parser.state {
            if line.starts_with("--- ") && starts_file_entry(lines.clone()) {
                return Err(DeltaCovError::malformed_diff(
                    line_number,
                    line,
                    "hunk ended before declared size",
                ));
            }
            open.consume(line)
                .map_err(|reason| DeltaCovError::malformed_diff(line_number, line, reason))?;
            if open.is_complete() {
                parser.close_hunk();
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            parser.flush();
            let (old_path, new_path) = parse_git_header_paths(rest);
            parser.current = Some(PendingFile::new(old_path, new_path));
        } else if let Some(rest) = line.strip_prefix("--- ") {
            let Some((_, plus_line)) = lines.next_if(|(_, next)| next.starts_with("+++ ")) else {
                return Err(DeltaCovError::malformed_diff(
                    line_number,
                    line,
                    "expected '+++' header after '---'",
                ));
            };
            parser.open_file(header_path(rest), header_path(&plus_line[4..]));
        } else if line.starts_with("@@") {
            let open = parse_hunk_header(line)
                .ok_or_else(|| DeltaCovError::malformed_diff(line_number, line, "malformed hunk header"))?;
            if parser.current.is_none() {
                return Err(DeltaCovError::malformed_diff(
                    line_number,
                    line,
                    "hunk header outside of a file",
                ));
            }
            if open.is_complete() {
                parser.push_hunk(open.hunk);
            } else {
                parser.state = State::InHunk(open);
            }
        } else if let Some(rest) = line.strip_prefix("Binary files ") {
            let (old_path, new_path) = parse_binary_paths(rest);
            parser.mark_binary(old_path, new_path);
        } else if line.starts_with("GIT binary patch") {
            if let Some(pending) = parser.current.as_mut() {
                pending.diff.kind = ChangeKind::Binary;
            }
        } else if let Some(pending) = parser.current.as_mut() {
            apply_extended_header(pending, line);
        }
        // Anything else (commit preamble, `index` lines, blank lines) is noise.
    }

    if let State::InHunk(open) = &parser.state {
        let line_number = text.lines().count();
        return Err(DeltaCovError::MalformedDiff {
            line_number,
            line: String::new(),
            reason: format!(
                "unexpected end of input: hunk expects {} more old and {} more new lines",
                open.old_remaining, open.new_remaining
            ),
        });
    }

    parser.flush();
    Ok(parser.files)
}

impl DiffParser {
    fn flush(&mut self) {
        if let Some(pending) = self.current.take() {
            self.files.push(pending.diff);
        }
    }

    fn open_file(&mut self, old_path: Option<String>, new_path: Option<String>) {
        // `---`/`+++` directly after a `diff --git` line describe the same
        // entry; otherwise they start a new one.
        let reuse = self
            .current
            .as_ref()
            .is_some_and(|p| !p.has_file_headers && p.diff.hunks.is_empty());
        if !reuse {
            self.flush();
            self.current = Some(PendingFile::new(None, None));
        }
        let Some(pending) = self.current.as_mut() else {
            return;
        };

        let diff = &mut pending.diff;
        diff.kind = match (&old_path, &new_path) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Deleted,
            (Some(old), Some(new)) if old != new => ChangeKind::Renamed,
            _ if diff.kind == ChangeKind::Renamed => ChangeKind::Renamed,
            _ => ChangeKind::Modified,
        };
        diff.old_path = old_path;
        diff.new_path = new_path;
        pending.has_file_headers = true;
    }

    fn mark_binary(&mut self, old_path: Option<String>, new_path: Option<String>) {
        let reuse = self
            .current
            .as_ref()
            .is_some_and(|p| !p.has_file_headers && p.diff.hunks.is_empty());
        if !reuse {
            self.flush();
        }
        let pending = self
            .current
            .get_or_insert_with(|| PendingFile::new(None, None));
        pending.diff.kind = ChangeKind::Binary;
        pending.diff.old_path = old_path;
        pending.diff.new_path = new_path;
        pending.has_file_headers = true;
    }

    fn close_hunk(&mut self) {
        if let State::InHunk(open) = std::mem::replace(&mut self.state, State::AwaitingFileHeader) {
            self.push_hunk(open.hunk);
        }
    }

    fn push_hunk(&mut self, hunk: DiffHunk) {
        if let Some(pending) = self.current.as_mut() {
            pending.diff.hunks.push(hunk);
        }
    }
}

/// Whether the lines after a `---` read as the rest of a file header: a
/// `+++` line followed by a hunk header or a new `diff --git` entry.
fn starts_file_entry<'a>(mut ahead: impl Iterator<Item = (usize, &'a str)>) -> bool {
    let Some((_, plus_line)) = ahead.next() else {
        return false;
    };
    if !plus_line.starts_with("+++ ") {
        return false;
    }
    ahead
        .next()
        .is_some_and(|(_, next)| next.starts_with("@@ ") || next.starts_with("diff --git "))
}

/// Git extended header lines that refine the entry opened by `diff --git`.
fn apply_extended_header(pending: &mut PendingFile, line: &str) {
    if pending.has_file_headers {
        return;
    }
    let diff = &mut pending.diff;
    if line.starts_with("new file mode") {
        diff.kind = ChangeKind::Added;
        diff.old_path = None;
    } else if line.starts_with("deleted file mode") {
        diff.kind = ChangeKind::Deleted;
        diff.new_path = None;
    } else if let Some(path) = line.strip_prefix("rename from ") {
        diff.kind = ChangeKind::Renamed;
        diff.old_path = Some(unquote(path).to_string());
    } else if let Some(path) = line.strip_prefix("rename to ") {
        diff.kind = ChangeKind::Renamed;
        diff.new_path = Some(unquote(path).to_string());
    }
}

fn parse_hunk_header(line: &str) -> Option<OpenHunk> {
    let caps = HUNK_HEADER_RE.captures(line)?;
    let number = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some(OpenHunk::open(
        number(1, 0)?,
        number(2, 1)?,
        number(3, 0)?,
        number(4, 1)?,
    ))
}

/// Path from a `---`/`+++` header, or `None` for `/dev/null`.
fn header_path(rest: &str) -> Option<String> {
    // Some tools append a tab and a timestamp.
    let raw = rest.split('\t').next().unwrap_or(rest).trim_end();
    let raw = unquote(raw);
    if raw == DEV_NULL {
        return None;
    }
    Some(strip_vcs_prefix(raw).to_string())
}

/// `a/foo b/foo` from a `diff --git` line. Paths containing spaces are
/// ambiguous here; the `---`/`+++` headers, when present, take precedence.
fn parse_git_header_paths(rest: &str) -> (Option<String>, Option<String>) {
    let split = rest
        .find(" b/")
        .map(|idx| (&rest[..idx], &rest[idx + 1..]))
        .or_else(|| rest.split_once(' '));
    match split {
        Some((old, new)) => (header_path(old), header_path(new)),
        None => (None, header_path(rest)),
    }
}

/// `a/x.bin and b/x.bin differ`
fn parse_binary_paths(rest: &str) -> (Option<String>, Option<String>) {
    let rest = rest.strip_suffix(" differ").unwrap_or(rest);
    match rest.split_once(" and ") {
        Some((old, new)) => (header_path(old), header_path(new)),
        None => (None, header_path(rest)),
    }
}

fn strip_vcs_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}
