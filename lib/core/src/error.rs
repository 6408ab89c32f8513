use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Input error for {path:?}: {message}")]
    InputFile { path: PathBuf, message: String },

    #[error("Encoding failed at batch {batch}: {message}")]
    Encoding { batch: usize, message: String },

    #[error("Alignment violation: {representations} representations but {metadata} metadata rows")]
    AlignmentViolation { representations: usize, metadata: usize },

    #[error("Invalid vector dimension at row {row}: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize, row: usize },

    #[error("Store error during {phase} at batch {batch} ({committed} prior batches committed): {message}")]
    Store {
        phase: String,
        batch: usize,
        committed: usize,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn input_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InputFile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn store(
        phase: impl Into<String>,
        batch: usize,
        committed: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            phase: phase.into(),
            batch,
            committed,
            message: message.into(),
        }
    }

    /// Check that two index-aligned sequences still line up.
    pub fn check_alignment(representations: usize, metadata: usize) -> Result<()> {
        if representations == metadata {
            Ok(())
        } else {
            Err(Self::AlignmentViolation {
                representations,
                metadata,
            })
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
