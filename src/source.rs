//! Ways to obtain the unified diff: a git comparison, a local file, a URL,
//! or stdin. Exactly one must be configured.
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::DiffSourceConfig;

/// File name the raw diff is saved under inside the report directory.
pub const DIFF_FILE_NAME: &str = "diff.patch";

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn pull_diff(&self) -> Result<String>;

    /// Human-readable description, for diagnostics.
    fn source_description(&self) -> String;

    /// Pull the diff and write it verbatim into `dir`.
    fn save_diff_to(&self, dir: &Path) -> Result<PathBuf> {
        let text = self.pull_diff()?;
        save_diff(dir, &text)
    }
}

/// Write `text` unchanged to `<dir>/diff.patch`, creating `dir` if needed.
pub fn save_diff(dir: &Path, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(DIFF_FILE_NAME);
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to write diff to {}", path.display()))?;
    info!("diff content saved to '{}'", path.display());
    Ok(path)
}

/// Diff from `git diff <base>` run in a repository.
pub struct GitDiffSource {
    pub repo_root: PathBuf,
    /// Revision to compare the working tree against, e.g. `origin/main`.
    pub base: String,
}

impl DiffSource for GitDiffSource {
    fn pull_diff(&self) -> Result<String> {
        let output = Command::new("git")
            .arg("diff")
            .arg("--no-color")
            .arg("--no-ext-diff")
            .arg(&self.base)
            .current_dir(&self.repo_root)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git diff failed: {stderr}");
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }

    fn source_description(&self) -> String {
        format!("Git: diff {}", self.base)
    }
}

/// Diff read from a local file.
pub struct FileDiffSource {
    pub path: PathBuf,
}

impl DiffSource for FileDiffSource {
    fn pull_diff(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read diff file {}", self.path.display()))
    }

    fn source_description(&self) -> String {
        format!("File: {}", self.path.display())
    }
}

/// Diff fetched over HTTP(S).
pub struct UrlDiffSource {
    pub url: String,
}

impl DiffSource for UrlDiffSource {
    fn pull_diff(&self) -> Result<String> {
        let resp = ureq::get(&self.url)
            .set("User-Agent", "deltacov")
            .call()
            .with_context(|| format!("Failed to fetch diff from {}", self.url))?;
        resp.into_string()
            .context("Failed to read diff response body")
    }

    fn source_description(&self) -> String {
        format!("URL: {}", self.url)
    }
}

/// Diff from stdin.
pub struct StdinDiffSource;

impl DiffSource for StdinDiffSource {
    fn pull_diff(&self) -> Result<String> {
        std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")
    }

    fn source_description(&self) -> String {
        "Stdin".to_string()
    }
}

/// Build the single configured diff source. Relative file paths and the git
/// working directory resolve against `root`.
pub fn diff_source_factory(root: &Path, config: &DiffSourceConfig) -> Result<Box<dyn DiffSource>> {
    let file = non_blank(config.file.as_deref());
    let url = non_blank(config.url.as_deref());
    let git = non_blank(config.git.as_deref());

    let configured: Vec<&str> = [("file", file), ("url", url), ("git", git)]
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(name, _)| *name)
        .collect();
    if configured.len() > 1 {
        bail!(
            "Expected exactly one diff source but found: {}",
            configured.join(", ")
        );
    }

    let source: Box<dyn DiffSource> = match (file, url, git) {
        (Some("-"), _, _) => Box::new(StdinDiffSource),
        (Some(file), _, _) => Box::new(FileDiffSource {
            path: root.join(file),
        }),
        (_, Some(url), _) => Box::new(UrlDiffSource {
            url: url.to_string(),
        }),
        (_, _, Some(base)) => Box::new(GitDiffSource {
            repo_root: root.to_path_buf(),
            base: base.to_string(),
        }),
        _ => bail!("Expected Git configuration or file or URL diff source but all are blank"),
    };
    Ok(source)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
