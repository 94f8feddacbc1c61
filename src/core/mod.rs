pub mod extractor;
pub mod pipeline;

pub use extractor::{ExtractionOptions, Vocabulary, VocabularyExtractor, VocabularyKind};
pub use pipeline::{ConversionReport, Converter, FileOutcome, FileStatus, WrittenVocabulary};
