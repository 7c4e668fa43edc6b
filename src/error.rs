use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("source {path:?} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("source {path:?} is missing expected column(s): {}", missing.join(", "))]
    SchemaMismatch { path: PathBuf, missing: Vec<String> },
    #[error("unknown field '{field}' (available: {})", available.join(", "))]
    UnknownField {
        field: String,
        available: Vec<String>,
    },
    #[error("failed to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("group {key} has no rows")]
    EmptyGroup { key: String },
}

impl EtlError {
    pub fn source_unavailable(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        EtlError::SourceUnavailable {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        EtlError::WriteFailure {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::SourceUnavailable { .. } => "SourceUnavailable",
            EtlError::SchemaMismatch { .. } => "SchemaMismatch",
            EtlError::UnknownField { .. } => "UnknownField",
            EtlError::WriteFailure { .. } => "WriteFailure",
            EtlError::EmptyGroup { .. } => "EmptyGroup",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
