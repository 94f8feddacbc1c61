use anyhow::{Result, Context};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::core::ConversionReport;

/// Escape text for XML element content and quoted attribute values.
pub fn xml_escape(value: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Yaml,
}

impl ReportFormat {
    /// `.json` selects JSON, anything else YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Yaml,
        }
    }
}

pub struct ReportSerializer;

impl ReportSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize(&self, report: &ConversionReport, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize report to JSON"),
            ReportFormat::Yaml => serde_yaml::to_string(report)
                .context("Failed to serialize report to YAML"),
        }
    }

    pub fn write_to_file(&self, report: &ConversionReport, path: &Path) -> Result<()> {
        let content = self.serialize(report, ReportFormat::from_path(path))?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

impl Default for ReportSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FileOutcome, FileStatus, WrittenVocabulary};
    use std::path::PathBuf;

    fn sample_report() -> ConversionReport {
        let mut report = ConversionReport::default();
        report.files.push(FileOutcome {
            source: PathBuf::from("x.rdf"),
            status: FileStatus::Converted {
                vocabularies: vec![WrittenVocabulary {
                    name: "Colors".to_string(),
                    output: PathBuf::from("Colors.xml"),
                    terms: 3,
                }],
            },
            collisions: vec![],
        });
        report.files.push(FileOutcome {
            source: PathBuf::from("y.rdf"),
            status: FileStatus::Failed {
                error: "Failed to parse RDF file y.rdf: unexpected end".to_string(),
            },
            collisions: vec![],
        });
        report
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("Tom & \"Jerry\" <cat>"), "Tom &amp; &quot;Jerry&quot; &lt;cat&gt;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn test_report_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("r.JSON")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("r.yaml")), ReportFormat::Yaml);
        assert_eq!(ReportFormat::from_path(Path::new("report")), ReportFormat::Yaml);
    }

    #[test]
    fn test_serialize_json() {
        let json = ReportSerializer::new()
            .serialize(&sample_report(), ReportFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files"][0]["status"]["state"], "converted");
        assert_eq!(value["files"][1]["status"]["state"], "failed");
    }

    #[test]
    fn test_write_yaml_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.yaml");
        ReportSerializer::new().write_to_file(&sample_report(), &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("Colors.xml"));
        assert!(written.contains("failed"));
    }
}
