use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DeltaCovError, Result};
use crate::model::CoverageData;
use crate::parsers::{detect_format, Format};

/// Read a coverage file, auto-detect its format (or use the override), and
/// parse it.
pub fn load(file_path: &Path, format_override: Option<Format>) -> Result<(CoverageData, Format)> {
    let content = std::fs::read(file_path)?;

    let format = match format_override {
        Some(format) => format,
        None => detect_format(file_path, &content).ok_or(DeltaCovError::UnknownFormat)?,
    };

    let data = format.parser().parse(&content)?;
    debug!(
        "Loaded {} as {} ({} source files)",
        file_path.display(),
        format,
        data.files.len()
    );
    Ok((data, format))
}

/// Load and merge every existing coverage file. Files that do not exist are
/// skipped with a warning; if none remain this is a configuration error.
pub fn load_all(files: &[PathBuf], format_override: Option<Format>) -> Result<CoverageData> {
    let existing: Vec<&PathBuf> = files
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("Coverage file {} does not exist, skipping", path.display());
            }
            exists
        })
        .collect();

    if existing.is_empty() {
        return Err(DeltaCovError::Config(
            "no coverage input files could be resolved".to_string(),
        ));
    }

    let mut merged = CoverageData::new();
    for path in existing {
        let (data, _) = load(path, format_override)?;
        merged.merge(data);
    }
    Ok(merged)
}
