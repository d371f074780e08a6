/// Parser for JaCoCo XML coverage reports.
///
/// JaCoCo XML structure:
///   <report name="...">
///     <sessioninfo id="..." start="..." dump="..."/>
///     <package name="com/example">
///       <class name="com/example/Foo" sourcefilename="Foo.java">
///         <method .../>
///         <counter type="INSTRUCTION" missed="2" covered="10"/>
///       </class>
///       <sourcefile name="Foo.java">
///         <line nr="10" mi="0" ci="3" mb="0" cb="2"/>
///         <line nr="11" mi="0" ci="5" mb="1" cb="1"/>
///         <counter type="LINE" missed="1" covered="5"/>
///       </sourcefile>
///     </package>
///   </report>
///
/// Only `<sourcefile>` line records are read: each `<line>` carries the
/// missed/covered instruction (`mi`/`ci`) and branch (`mb`/`cb`) counts of
/// that line, which is exactly the per-line attribution the diff filter
/// needs. Aggregate `<counter>` elements are ignored and recomputed.
use std::path::Path;

use quick_xml::events::Event;

use super::{get_attr, get_count, CoverageParser, Format};
use crate::error::Result;
use crate::model::*;

/// JaCoCo XML format parser.
pub struct JacocoParser;

impl CoverageParser for JacocoParser {
    fn format(&self) -> Format {
        Format::Jacoco
    }

    fn can_parse(&self, _path: &Path, content: &[u8]) -> bool {
        let head = super::sniff_head(content);
        super::looks_like_xml(&head)
            && head.contains("<report")
            && (head.contains("JACOCO") || head.contains("jacoco") || head.contains("<package"))
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse JaCoCo XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut xml = super::xml_reader(input);
    let mut buf = Vec::new();
    let mut data = CoverageData::new();

    let mut current_package: Option<String> = None;
    let mut current_sourcefile: Option<FileCoverage> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"package" => {
                    current_package = get_attr(e, b"name");
                }
                b"sourcefile" => {
                    if let Some(name) = get_attr(e, b"name") {
                        let path = match &current_package {
                            Some(pkg) if !pkg.is_empty() => format!("{}/{}", pkg, name),
                            _ => name,
                        };
                        current_sourcefile = Some(FileCoverage::new(path));
                    }
                }
                b"line" => {
                    let line_number = get_attr(e, b"nr").and_then(|v| v.parse::<u32>().ok());
                    if let (Some(file), Some(line_number)) =
                        (current_sourcefile.as_mut(), line_number)
                    {
                        let instructions =
                            CoverageCounter::new(get_count(e, b"mi"), get_count(e, b"ci"));
                        let branches =
                            CoverageCounter::new(get_count(e, b"mb"), get_count(e, b"cb"));

                        // Lines without instructions (comments, blank lines)
                        // are not instrumentable.
                        if !instructions.is_empty() {
                            file.lines.push(LineCoverage {
                                line_number,
                                hit_count: instructions.covered,
                                instructions,
                                branches,
                            });
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"package" => {
                    current_package = None;
                }
                b"sourcefile" => {
                    if let Some(mut file) = current_sourcefile.take() {
                        file.lines.sort_by_key(|l| l.line_number);
                        data.files.push(file);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed sourcefile
    if let Some(mut file) = current_sourcefile.take() {
        file.lines.sort_by_key(|l| l.line_number);
        data.files.push(file);
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeltaCovError;

    #[test]
    fn test_parse_jacoco() {
        let input = include_bytes!("../../tests/fixtures/sample_jacoco.xml");
        let data = parse(input).unwrap();

        assert_eq!(data.files.len(), 2);

        let foo = &data.files[0];
        assert_eq!(foo.path, "com/example/Foo.java");
        let numbers: Vec<u32> = foo.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![3, 10, 11, 12, 15]);
        assert_eq!(foo.lines[0].hit_count, 3); // ci=3
        assert_eq!(foo.lines[2].instructions, CoverageCounter::new(0, 5));
        assert_eq!(foo.lines[2].branches, CoverageCounter::new(1, 1));
        assert_eq!(foo.lines[3].hit_count, 0); // ci=0, mi=2 → missed
        assert_eq!(foo.lines[3].instructions, CoverageCounter::new(2, 0));

        let bar = &data.files[1];
        assert_eq!(bar.path, "com/example/Bar.java");
        assert_eq!(bar.lines.len(), 2);
        assert!(bar.lines.iter().all(|l| l.branches.is_empty()));
    }

    #[test]
    fn test_parse_jacoco_huge_counters() {
        let input = br#"<report name="app">
  <package name="p">
    <sourcefile name="A.java">
      <line nr="1" mi="18446744073709551615" ci="1" mb="0" cb="0"/>
      <line nr="2" mi="18446744073709551615" ci="1" mb="0" cb="0"/>
    </sourcefile>
  </package>
</report>"#;
        let data = parse(input).unwrap();
        let counters = data.counters();
        assert_eq!(
            counters[&CoverageEntity::Instruction],
            CoverageCounter::new(u64::MAX, 2)
        );
        assert_eq!(counters[&CoverageEntity::Line], CoverageCounter::new(0, 2));
    }

    #[test]
    fn test_parse_jacoco_no_package() {
        let input = br#"<?xml version="1.0"?>
<report name="app">
  <sourcefile name="App.java">
    <line nr="1" mi="0" ci="2" mb="0" cb="0"/>
    <line nr="2" mi="1" ci="0" mb="0" cb="0"/>
    <line nr="3" mi="0" ci="0" mb="0" cb="0"/>
  </sourcefile>
</report>"#;
        let data = parse(input).unwrap();

        assert_eq!(data.files.len(), 1);
        // Without a package, path is just the source filename.
        assert_eq!(data.files[0].path, "App.java");
        assert_eq!(data.files[0].lines.len(), 2);
    }

    #[test]
    fn test_parse_jacoco_empty() {
        let input = br#"<?xml version="1.0"?><report name="empty"></report>"#;
        let data = parse(input).unwrap();
        assert!(data.files.is_empty());
    }

    #[test]
    fn test_parse_jacoco_malformed() {
        let input = br#"<?xml version="1.0"?><report name="x"><package name="a"></report>"#;
        let err = parse(input).unwrap_err();
        assert!(matches!(err, DeltaCovError::Xml { .. }), "{err}");
        assert!(err.to_string().contains("position"), "{err}");
    }

    #[test]
    fn test_can_parse_jacoco() {
        let parser = JacocoParser;

        let content = br#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd"><report name="test">"#;
        assert!(parser.can_parse(Path::new("jacoco.xml"), content));

        let content = br#"<?xml version="1.0"?><report name="test"><package name="com/example">"#;
        assert!(parser.can_parse(Path::new("report.xml"), content));

        let content = br#"<?xml version="1.0"?><coverage version="1.0">"#;
        assert!(!parser.can_parse(Path::new("coverage.xml"), content));
    }
}
