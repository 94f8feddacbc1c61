pub mod config;
pub mod core;
pub mod error;
pub mod handlers;
pub mod knowledge_graph;
pub mod templates;
pub mod utils;

pub use config::ConverterConfig;
pub use core::{Converter, ConversionReport, Vocabulary, VocabularyExtractor};
pub use error::ConversionError;
pub use handlers::SourceResolver;
pub use knowledge_graph::{KnowledgeGraph, Thesaurus};
pub use templates::{TermRenderer, VocabularyTemplate};
