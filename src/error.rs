use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversionError>;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Failed to parse RDF file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid template: {0}")]
    Template(String),

    #[error("Vocabulary '{vocabulary}' maps to {filename}, which is already used by '{existing}'")]
    FilenameCollision {
        vocabulary: String,
        filename: String,
        existing: String,
    },

    #[error("No RDF files found at: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("{} is not a valid file or directory", .0.display())]
    InvalidSource(PathBuf),

    #[error("Cycle in broader hierarchy of {}: {}", .path.display(), .concepts.join(" -> "))]
    Cycle { path: PathBuf, concepts: Vec<String> },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}
