use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{CollisionPolicy, ConverterConfig};
use crate::core::extractor::{ExtractionOptions, Vocabulary, VocabularyExtractor};
use crate::error::{ConversionError, Result};
use crate::handlers::SourceResolver;
use crate::knowledge_graph::{KnowledgeGraph, Thesaurus};
use crate::templates::{output_filename, vocabulary_code, TermRenderer, VocabularyContext, VocabularyTemplate};
use crate::utils::dates::{format_system_time, normalize_date};

#[derive(Debug, Clone, Serialize)]
pub struct WrittenVocabulary {
    pub name: String,
    pub output: PathBuf,
    pub terms: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Converted { vocabularies: Vec<WrittenVocabulary> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub status: FileStatus,
    /// Vocabularies of this file that were not written because their
    /// filename was taken.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<String>,
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub files: Vec<FileOutcome>,
}

impl ConversionReport {
    pub fn converted(&self) -> usize {
        self.files.iter().filter(|f| !f.is_failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.is_failed()).count()
    }

    pub fn collisions(&self) -> usize {
        self.files.iter().map(|f| f.collisions.len()).sum()
    }

    pub fn vocabularies_written(&self) -> usize {
        self.files
            .iter()
            .map(|f| match &f.status {
                FileStatus::Converted { vocabularies } => vocabularies.len(),
                FileStatus::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.collisions() > 0
    }
}

/// Output filenames handed out during this run, compared case-insensitively.
#[derive(Debug, Default)]
struct OutputRegistry {
    used: HashMap<String, String>,
}

impl OutputRegistry {
    fn claim(&mut self, filename: &str, vocabulary: &str, policy: CollisionPolicy) -> Result<String> {
        let key = filename.to_lowercase();
        let Some(existing) = self.used.get(&key) else {
            self.used.insert(key, vocabulary.to_string());
            return Ok(filename.to_string());
        };

        match policy {
            CollisionPolicy::Skip => Err(ConversionError::FilenameCollision {
                vocabulary: vocabulary.to_string(),
                filename: filename.to_string(),
                existing: existing.clone(),
            }),
            CollisionPolicy::Suffix => {
                let stem = filename.strip_suffix(".xml").unwrap_or(filename);
                let mut n = 2;
                loop {
                    let candidate = format!("{}_{}.xml", stem, n);
                    let key = candidate.to_lowercase();
                    if !self.used.contains_key(&key) {
                        warn!("{} is already used, writing '{}' to {}", filename, vocabulary, candidate);
                        self.used.insert(key, vocabulary.to_string());
                        return Ok(candidate);
                    }
                    n += 1;
                }
            }
        }
    }
}

/// Runs load → extract → render → write for each source file.
pub struct Converter {
    config: ConverterConfig,
    template: VocabularyTemplate,
    renderer: TermRenderer,
    registry: OutputRegistry,
}

impl Converter {
    pub fn new(config: ConverterConfig, template: VocabularyTemplate) -> Result<Self> {
        config.validate()?;
        let renderer = TermRenderer::new(&config.namespace, config.include_synonyms)?;

        Ok(Self {
            config,
            template,
            renderer,
            registry: OutputRegistry::default(),
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Resolve SOURCE and convert every file it names.
    pub fn convert_path(&mut self, source: &Path) -> Result<ConversionReport> {
        let files = SourceResolver::from_config(&self.config).resolve(source)?;
        Ok(self.convert_files(&files, |_| {}))
    }

    pub fn convert_files(&mut self, files: &[PathBuf], mut on_file: impl FnMut(&FileOutcome)) -> ConversionReport {
        let mut report = ConversionReport::default();
        for path in files {
            let outcome = self.convert_file(path);
            on_file(&outcome);
            report.files.push(outcome);
        }
        report
    }

    /// Convert one file. Failures are captured in the outcome so the batch
    /// can continue.
    pub fn convert_file(&mut self, path: &Path) -> FileOutcome {
        info!("Converting SKOS file: {}", path.display());

        let mut collisions = Vec::new();
        let status = match self.write_vocabularies(path, &mut collisions) {
            Ok(vocabularies) => FileStatus::Converted { vocabularies },
            Err(e) => {
                error!("{} File will be skipped.", e);
                FileStatus::Failed { error: e.to_string() }
            }
        };

        FileOutcome {
            source: path.to_path_buf(),
            status,
            collisions,
        }
    }

    /// Load a file and partition it into vocabularies without writing.
    pub fn extract_file(&self, path: &Path) -> Result<Vec<Vocabulary>> {
        let graph = KnowledgeGraph::load(path)?;
        let thesaurus = Thesaurus::from_graph(&graph, &self.config.language);

        let options = ExtractionOptions {
            fallback: self.config.top_concept_fallback,
            default_date: self.default_date(path)?,
            source_name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        VocabularyExtractor::new(&thesaurus, options).extract(path)
    }

    /// Final XML document for one vocabulary and its term count.
    pub fn render(&self, vocabulary: &Vocabulary) -> Result<(String, usize)> {
        let (terms, count) = self.renderer.render_block(vocabulary)?;
        let code = vocabulary_code(&self.config.namespace, &vocabulary.name);

        let context = VocabularyContext {
            name: &vocabulary.name,
            code: &code,
            description: &vocabulary.description,
            created: &vocabulary.created,
            last_update: &vocabulary.last_update,
            terms: &terms,
        };

        Ok((self.template.compose(&context), count))
    }

    fn write_vocabularies(&mut self, path: &Path, collisions: &mut Vec<String>) -> Result<Vec<WrittenVocabulary>> {
        let vocabularies = self.extract_file(path)?;
        if vocabularies.is_empty() {
            warn!("No terms found in file: {}", path.display());
        }

        let mut written = Vec::with_capacity(vocabularies.len());
        for vocabulary in &vocabularies {
            let (document, terms) = self.render(vocabulary)?;

            let filename = match self.registry.claim(
                &output_filename(&vocabulary.name),
                &vocabulary.name,
                self.config.collision_policy,
            ) {
                Ok(filename) => filename,
                Err(e @ ConversionError::FilenameCollision { .. }) => {
                    error!("{}", e);
                    collisions.push(e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };

            let output = self.config.output_dir.join(&filename);
            if self.config.dry_run {
                info!("Dry run, not writing: {}", output.display());
            } else {
                fs::create_dir_all(&self.config.output_dir)
                    .map_err(|e| ConversionError::io(&self.config.output_dir, e))?;
                fs::write(&output, document).map_err(|e| ConversionError::io(&output, e))?;
                info!("Wrote result in file: {}", output.display());
            }

            written.push(WrittenVocabulary {
                name: vocabulary.name.clone(),
                output,
                terms,
            });
        }

        Ok(written)
    }

    fn default_date(&self, path: &Path) -> Result<String> {
        if let Some(raw) = self.config.default_date.as_deref() {
            return normalize_date(raw).ok_or_else(|| {
                ConversionError::Config(format!("default_date is not a recognised date: '{}'", raw))
            });
        }

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| ConversionError::io(path, e))?;
        Ok(format_system_time(modified))
    }
}
