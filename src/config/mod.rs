use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};

use crate::error::ConversionError;
use crate::utils::dates::normalize_date;

pub const DEFAULT_NAMESPACE: &str = "parthenos";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TEMPLATE_FILE: &str = "template.xml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Prefix for vocabulary and term codes.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Preferred language tag for labels, synonyms and notes.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub top_concept_fallback: TopConceptFallback,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_date: Option<String>,
    #[serde(default = "default_true")]
    pub include_synonyms: bool,
    #[serde(default)]
    pub dry_run: bool,
}

/// What happens when a second vocabulary resolves to an output filename
/// already written in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep the first file, report the collision.
    #[default]
    Skip,
    /// Write the later vocabulary as `<name>_2.xml`, `<name>_3.xml`, ...
    Suffix,
}

/// How top concepts are chosen when a graph carries no
/// `skos:hasTopConcept` / `skos:topConceptOf` statement at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopConceptFallback {
    /// No top concepts; everything lands in the unclassified vocabulary.
    #[default]
    Unclassified,
    /// Every concept without a parent becomes a top concept.
    ParentlessRoots,
}

fn default_namespace() -> String { DEFAULT_NAMESPACE.to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_language() -> String { DEFAULT_LANGUAGE.to_string() }
fn default_extensions() -> Vec<String> { vec!["rdf".to_string()] }
fn default_true() -> bool { true }

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            template: None,
            output_dir: default_output_dir(),
            language: default_language(),
            extensions: default_extensions(),
            recursive: false,
            collision_policy: CollisionPolicy::default(),
            top_concept_fallback: TopConceptFallback::default(),
            default_date: None,
            include_synonyms: true,
            dry_run: false,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConversionError> {
        if self.namespace.trim().is_empty() {
            return Err(ConversionError::Config("namespace must not be empty".to_string()));
        }

        if self.namespace.chars().any(char::is_whitespace) {
            return Err(ConversionError::Config(format!(
                "namespace must not contain whitespace: '{}'",
                self.namespace
            )));
        }

        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConversionError::Config("no input file extensions configured".to_string()));
        }

        if let Some(ref date) = self.default_date {
            if normalize_date(date).is_none() {
                return Err(ConversionError::Config(format!(
                    "default_date is not a recognised date: '{}'",
                    date
                )));
            }
        }

        Ok(())
    }

    /// Extensions without a leading dot, lowercased.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Create an example configuration
    pub fn example() -> Self {
        ConverterConfig {
            namespace: DEFAULT_NAMESPACE.to_string(),
            template: Some(PathBuf::from(DEFAULT_TEMPLATE_FILE)),
            output_dir: PathBuf::from("vocabularies"),
            language: DEFAULT_LANGUAGE.to_string(),
            extensions: vec!["rdf".to_string(), "ttl".to_string()],
            recursive: false,
            collision_policy: CollisionPolicy::Suffix,
            top_concept_fallback: TopConceptFallback::Unclassified,
            default_date: Some("2017-01-01T00:00:00".to_string()),
            include_synonyms: true,
            dry_run: false,
        }
    }
}
