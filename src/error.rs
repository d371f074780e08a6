use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeltaCovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("malformed diff at line {line_number}: {reason}: '{line}'")]
    MalformedDiff {
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Fail on violations: {count} found:\n{details}")]
    Violations { count: usize, details: String },
}

impl DeltaCovError {
    pub(crate) fn malformed_diff(line_number: usize, line: &str, reason: &str) -> Self {
        DeltaCovError::MalformedDiff {
            line_number,
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeltaCovError>;
