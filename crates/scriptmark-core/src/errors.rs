//! Error types for the scriptmark core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the scriptmark core library.
///
/// An incomplete script is not an error: see
/// [`Completeness`](crate::candidate::Completeness).
#[derive(Debug, thiserror::Error)]
pub enum MarkingError {
    #[error("Mark scheme format error: {0}")]
    SchemeFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Invalid mark: {0}")]
    InvalidMark(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<MarkingError> for PyErr {
    fn from(err: MarkingError) -> PyErr {
        match &err {
            MarkingError::Storage(_) | MarkingError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            MarkingError::SchemeFormat(_)
            | MarkingError::Navigation(_)
            | MarkingError::InvalidMark(_) => {
                PyValueError::new_err(err.to_string())
            }
            MarkingError::Ingest(_) | MarkingError::Io(_) => PyIOError::new_err(err.to_string()),
            MarkingError::Json(_) => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type MarkingResult<T> = Result<T, MarkingError>;
