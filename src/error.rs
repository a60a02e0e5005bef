use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the reconciliation engine.
///
/// Most stages degrade instead of failing; the variants below are what remains once
/// every soft fallback has been exhausted, plus the join feasibility signal that the
/// pipeline converts into a concatenation.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to read spreadsheet {path:?}: {message}")]
    SpreadsheetRead { path: PathBuf, message: String },
    #[error("Failed to write spreadsheet {path:?}: {source}")]
    SpreadsheetWrite {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
    #[error("Invalid configuration {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unsupported file format for {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("Price join not possible: {0}")]
    JoinInfeasible(String),
    #[error("No input data: both primary and reference tables are empty")]
    NoInput,
}

impl ReconError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ReconError> = std::result::Result<T, E>;
