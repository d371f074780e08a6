pub mod jacoco;
pub mod lcov;

use std::path::Path;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

use crate::error::{DeltaCovError, Result};
use crate::model::CoverageData;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Jacoco,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jacoco => "jacoco",
            Format::Lcov => "lcov",
        }
    }

    pub fn parser(&self) -> &'static dyn CoverageParser {
        match self {
            Format::Jacoco => &jacoco::JacocoParser,
            Format::Lcov => &lcov::LcovParser,
        }
    }
}

impl std::str::FromStr for Format {
    type Err = DeltaCovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jacoco" => Ok(Format::Jacoco),
            "lcov" => Ok(Format::Lcov),
            _ => Err(DeltaCovError::Parse(format!(
                "Unknown format: '{}'. Supported: jacoco, lcov",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every format parser implements this trait.
pub trait CoverageParser {
    fn format(&self) -> Format;

    /// Cheap check on the file name and the first bytes of content.
    fn can_parse(&self, path: &Path, content: &[u8]) -> bool;

    /// Parse the input bytes into the uniform coverage model.
    fn parse(&self, input: &[u8]) -> Result<CoverageData>;
}

/// Detect the coverage format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    [Format::Lcov, Format::Jacoco]
        .into_iter()
        .find(|format| format.parser().can_parse(path, content))
}

/// Up to the first 4 KiB of content, lossily decoded.
pub(crate) fn sniff_head(content: &[u8]) -> String {
    let head_len = content.len().min(4096);
    String::from_utf8_lossy(&content[..head_len]).into_owned()
}

pub(crate) fn looks_like_xml(head: &str) -> bool {
    head.contains("<?xml") || head.trim_start().starts_with('<')
}

pub(crate) fn xml_reader(input: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

pub(crate) fn xml_err(source: quick_xml::Error, reader: &Reader<&[u8]>) -> DeltaCovError {
    DeltaCovError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Unescaped attribute value by name.
pub(crate) fn get_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Numeric attribute, 0 when absent or unparsable.
pub(crate) fn get_count(e: &BytesStart<'_>, name: &[u8]) -> u64 {
    get_attr(e, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
