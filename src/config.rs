//! Run configuration: an optional TOML file, overridden by CLI flags.
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DeltaCovError, Result};
use crate::model::CoverageEntity;
use crate::parsers::Format;
use crate::violation::{ValueType, ViolationRule};

/// Config file looked up in the root directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "deltacov.toml";

pub const DEFAULT_REPORT_DIR: &str = "build/reports/delta-coverage";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub diff: DiffSourceConfig,
    pub coverage: CoverageConfig,
    pub violations: ViolationsConfig,
    pub report: ReportConfig,
}

/// Where the diff comes from. Exactly one field must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffSourceConfig {
    /// Local diff file; `-` reads stdin.
    pub file: Option<String>,
    pub url: Option<String>,
    /// Revision passed to `git diff`.
    pub git: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    pub files: Vec<PathBuf>,
    pub format: Option<String>,
    /// Prepended to every diff path before matching coverage paths.
    pub path_prefix: Option<String>,
}

impl CoverageConfig {
    pub fn format(&self) -> Result<Option<Format>> {
        self.format.as_deref().map(str::parse::<Format>).transpose()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViolationsConfig {
    pub fail_on_violation: bool,
    pub min_instructions: Option<f64>,
    pub min_branches: Option<f64>,
    pub min_lines: Option<f64>,
    /// Shortcut applied to every `min_*` left unset.
    pub fail_if_coverage_less_than: Option<f64>,
    /// Ignore threshold for the `min_*` rules.
    pub entity_count_threshold: Option<u64>,
    #[serde(rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub entity: CoverageEntity,
    #[serde(default)]
    pub value: ValueType,
    pub min: f64,
    pub ignore_threshold: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub dir: PathBuf,
    /// Write the raw diff to `<dir>/diff.patch`.
    pub save_diff: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_REPORT_DIR),
            save_diff: false,
        }
    }
}

impl Config {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| DeltaCovError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        toml::from_str(text).map_err(|e| DeltaCovError::Config(e.message().to_string()))
    }

    /// Load `explicit` if given, else `<root>/deltacov.toml` if it exists,
    /// else defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = root.join(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::load(&default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Check everything that can be checked before any input is read.
    pub fn validate(&self) -> Result<()> {
        if self.coverage.files.is_empty() {
            return Err(DeltaCovError::Config(
                "no coverage files configured".to_string(),
            ));
        }
        self.coverage.format()?;
        self.violations.rules()?;
        Ok(())
    }
}

impl ViolationsConfig {
    /// Build the ordered rule list: `min_*` shortcut rules in INSTRUCTION,
    /// BRANCH, LINE order, then explicit rules in file order.
    pub fn rules(&self) -> Result<Vec<ViolationRule>> {
        let mut rules = Vec::new();

        let shortcuts = [
            (CoverageEntity::Instruction, self.min_instructions),
            (CoverageEntity::Branch, self.min_branches),
            (CoverageEntity::Line, self.min_lines),
        ];
        for (entity, min) in shortcuts {
            let Some(min) = min.or(self.fail_if_coverage_less_than) else {
                continue;
            };
            check_min(entity, ValueType::CoveredRatio, min)?;
            let mut rule = ViolationRule::ratio(entity, min);
            rule.ignore_threshold = self.entity_count_threshold;
            rules.push(rule);
        }

        for rule in &self.rules {
            check_min(rule.entity, rule.value, rule.min)?;
            rules.push(ViolationRule {
                entity: rule.entity,
                value_type: rule.value,
                min: rule.min,
                ignore_threshold: rule.ignore_threshold,
            });
        }

        Ok(rules)
    }
}

fn check_min(entity: CoverageEntity, value: ValueType, min: f64) -> Result<()> {
    if !min.is_finite() || min < 0.0 {
        return Err(DeltaCovError::Config(format!(
            "{entity} rule: min must be a non-negative number, got {min}"
        )));
    }
    if value.is_ratio() && min > 1.0 {
        return Err(DeltaCovError::Config(format!(
            "{entity} rule: ratio min must be within [0, 1], got {min}"
        )));
    }
    Ok(())
}
