//! Error types for the photometry pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::algo::InterpError;

/// Coarse classification of [`PhotometryError`] for callers that decide
/// whether to skip, log or abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A throughput or SED file is missing, unreadable or malformed
    Io,
    /// Array shapes or wavelength grids cannot be reconciled
    ShapeMismatch,
    /// Observation metadata is incomplete (e.g. no m5 for a band)
    Configuration,
    /// In-memory arrays violate a construction invariant
    InvalidData,
}

/// Errors that can occur anywhere in the photometry pipeline
#[derive(Debug, Error)]
pub enum PhotometryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed table {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid wavelength grid: {0}")]
    InvalidGrid(String),
}

impl PhotometryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhotometryError::Io { .. } | PhotometryError::Parse { .. } => ErrorKind::Io,
            PhotometryError::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            PhotometryError::Configuration(_) => ErrorKind::Configuration,
            PhotometryError::InvalidGrid(_) => ErrorKind::InvalidData,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PhotometryError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<InterpError> for PhotometryError {
    fn from(err: InterpError) -> Self {
        match err {
            InterpError::NoOverlap(..) => PhotometryError::ShapeMismatch(err.to_string()),
            InterpError::InsufficientData
            | InterpError::MismatchedLengths
            | InterpError::UnsortedData => PhotometryError::InvalidGrid(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhotometryError>;
