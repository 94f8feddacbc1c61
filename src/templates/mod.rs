use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConversionError, Result};
use crate::utils::{sanitize_filename, xml_escape};

pub mod terms;

pub use terms::{TermEntry, TermRenderer};

/// D-NET vocabulary profile used when no template file is available.
pub const BUILTIN_TEMPLATE: &str = include_str!("template.xml");

const MARKER_PATTERN: &str =
    r"\*(VOCABULARY_NAME|DATE_OF_CREATION|LAST_UPDATE|TERMS|VOCABULARY_CODE|VOCABULARY_DESCRIPTION)\*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    VocabularyName,
    DateOfCreation,
    LastUpdate,
    Terms,
    VocabularyCode,
    VocabularyDescription,
}

impl Placeholder {
    pub const REQUIRED: [Placeholder; 4] = [
        Placeholder::VocabularyName,
        Placeholder::DateOfCreation,
        Placeholder::LastUpdate,
        Placeholder::Terms,
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "VOCABULARY_NAME" => Some(Placeholder::VocabularyName),
            "DATE_OF_CREATION" => Some(Placeholder::DateOfCreation),
            "LAST_UPDATE" => Some(Placeholder::LastUpdate),
            "TERMS" => Some(Placeholder::Terms),
            "VOCABULARY_CODE" => Some(Placeholder::VocabularyCode),
            "VOCABULARY_DESCRIPTION" => Some(Placeholder::VocabularyDescription),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Placeholder::VocabularyName => "*VOCABULARY_NAME*",
            Placeholder::DateOfCreation => "*DATE_OF_CREATION*",
            Placeholder::LastUpdate => "*LAST_UPDATE*",
            Placeholder::Terms => "*TERMS*",
            Placeholder::VocabularyCode => "*VOCABULARY_CODE*",
            Placeholder::VocabularyDescription => "*VOCABULARY_DESCRIPTION*",
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Marker {
        placeholder: Placeholder,
        /// Leading whitespace of the marker's line, reused for every line of
        /// a multi-line value.
        indent: String,
    },
}

/// Values substituted into one vocabulary file.
#[derive(Debug, Clone)]
pub struct VocabularyContext<'a> {
    pub name: &'a str,
    pub code: &'a str,
    pub description: &'a str,
    pub created: &'a str,
    pub last_update: &'a str,
    /// Pre-rendered `<TERM>` elements, inserted without escaping.
    pub terms: &'a str,
}

/// A template split into literal text and markers, compiled once and
/// reused for every vocabulary.
#[derive(Debug, Clone)]
pub struct VocabularyTemplate {
    segments: Vec<Segment>,
    source: Option<PathBuf>,
}

impl VocabularyTemplate {
    pub fn parse(text: &str) -> Result<Self> {
        let pattern = Regex::new(MARKER_PATTERN)
            .map_err(|e| ConversionError::Template(format!("marker pattern: {}", e)))?;

        let mut segments = Vec::new();
        let mut counts: HashMap<Placeholder, usize> = HashMap::new();
        let mut last = 0;

        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
            let Some(placeholder) = Placeholder::from_name(name.as_str()) else { continue };

            if whole.start() > last {
                segments.push(Segment::Text(text[last..whole.start()].to_string()));
            }

            let line_start = text[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            let prefix = &text[line_start..whole.start()];
            let indent = if prefix.chars().all(char::is_whitespace) {
                prefix.to_string()
            } else {
                String::new()
            };

            segments.push(Segment::Marker { placeholder, indent });
            *counts.entry(placeholder).or_default() += 1;
            last = whole.end();
        }

        if last < text.len() {
            segments.push(Segment::Text(text[last..].to_string()));
        }

        let missing: Vec<&str> = Placeholder::REQUIRED
            .iter()
            .filter(|p| !counts.contains_key(*p))
            .map(Placeholder::marker)
            .collect();
        if !missing.is_empty() {
            return Err(ConversionError::Template(format!(
                "missing required placeholder(s): {}",
                missing.join(", ")
            )));
        }

        let mut repeated: Vec<&str> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(p, _)| p.marker())
            .collect();
        if !repeated.is_empty() {
            repeated.sort_unstable();
            return Err(ConversionError::Template(format!(
                "placeholder(s) must appear exactly once: {}",
                repeated.join(", ")
            )));
        }

        Ok(Self { segments, source: None })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ConversionError::Template(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut template = Self::parse(&text).map_err(|e| match e {
            ConversionError::Template(msg) => {
                ConversionError::Template(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        template.source = Some(path.to_path_buf());

        info!("Loaded template: {}", path.display());
        Ok(template)
    }

    pub fn builtin() -> Result<Self> {
        debug!("Using built-in vocabulary template");
        Self::parse(BUILTIN_TEMPLATE)
    }

    /// Template file this was loaded from; `None` for the built-in one.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn placeholders(&self) -> Vec<Placeholder> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Marker { placeholder, .. } => Some(*placeholder),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Substitute all markers in a single pass; inserted values are never
    /// scanned for markers again.
    pub fn compose(&self, context: &VocabularyContext<'_>) -> String {
        let mut output = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Marker { placeholder, indent } => match placeholder {
                    Placeholder::Terms => {
                        let separator = format!("\n{}", indent);
                        output.push_str(&context.terms.replace('\n', &separator));
                    }
                    Placeholder::VocabularyName => output.push_str(&xml_escape(context.name)),
                    Placeholder::VocabularyCode => output.push_str(&xml_escape(context.code)),
                    Placeholder::VocabularyDescription => {
                        output.push_str(&xml_escape(context.description))
                    }
                    Placeholder::DateOfCreation => output.push_str(&xml_escape(context.created)),
                    Placeholder::LastUpdate => output.push_str(&xml_escape(context.last_update)),
                },
            }
        }

        output
    }
}

/// File name for a vocabulary: sanitized name plus `.xml`.
pub fn output_filename(vocabulary_name: &str) -> String {
    format!("{}.xml", sanitize_filename(vocabulary_name))
}

/// Code for `*VOCABULARY_CODE*`: `<namespace>:<sanitized name>`.
pub fn vocabulary_code(namespace: &str, vocabulary_name: &str) -> String {
    format!("{}:{}", namespace, sanitize_filename(vocabulary_name))
}
