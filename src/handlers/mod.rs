use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ConverterConfig;
use crate::error::{ConversionError, Result};

/// RDF syntaxes the graph loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    RdfXml,
    Turtle,
    NTriples,
}

impl RdfFormat {
    /// Pick a syntax from the file extension; unknown extensions are read as
    /// RDF/XML, the usual SKOS export format.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("ttl") | Some("turtle") => RdfFormat::Turtle,
            Some("nt") | Some("ntriples") => RdfFormat::NTriples,
            _ => RdfFormat::RdfXml,
        }
    }
}

impl std::fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RdfFormat::RdfXml => write!(f, "rdf/xml"),
            RdfFormat::Turtle => write!(f, "turtle"),
            RdfFormat::NTriples => write!(f, "n-triples"),
        }
    }
}

/// Expands a SOURCE argument into the ordered list of files to convert.
pub struct SourceResolver {
    extensions: Vec<String>,
    recursive: bool,
}

impl SourceResolver {
    pub fn new(extensions: Vec<String>, recursive: bool) -> Self {
        Self { extensions, recursive }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.normalized_extensions(), config.recursive)
    }

    pub fn resolve(&self, source: &Path) -> Result<Vec<PathBuf>> {
        if source.is_file() {
            return Ok(vec![source.to_path_buf()]);
        }

        if !source.is_dir() {
            return Err(ConversionError::InvalidSource(source.to_path_buf()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(source).max_depth(max_depth) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source).to_path_buf();
                ConversionError::io(path, e.into())
            })?;

            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        if files.is_empty() {
            return Err(ConversionError::EmptyInput(source.to_path_buf()));
        }

        files.sort();
        debug!("Resolved {} source files under {}", files.len(), source.display());
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| {
                self.extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}
