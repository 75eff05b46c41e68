//! Error types for histogram handling.

use thiserror::Error;

/// Errors that can occur building, combining, or storing histograms.
#[derive(Error, Debug)]
pub enum HistError {
    /// I/O error reading or writing a histogram file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed histogram file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bin edges are missing, unsorted, or inconsistent with the contents.
    #[error("invalid binning: {0}")]
    InvalidBinning(String),

    /// Two histograms combined bin-by-bin have different binning.
    #[error("binning mismatch: {0}")]
    BinningMismatch(String),

    /// Object not present in the file.
    #[error("object '{name}' not found in '{source_id}'")]
    NotFound {
        /// File (or other source) identifier.
        source_id: String,
        /// Requested object name.
        name: String,
    },

    /// Object present but of the wrong dimensionality.
    #[error("object '{name}' is not a {expected} histogram")]
    WrongKind {
        /// Requested object name.
        name: String,
        /// Expected kind ("1D" or "2D").
        expected: &'static str,
    },
}

/// Result alias for histogram operations.
pub type Result<T> = std::result::Result<T, HistError>;

impl From<HistError> for bf_core::Error {
    fn from(e: HistError) -> Self {
        match e {
            HistError::Io(e) => bf_core::Error::Io(e),
            HistError::Json(e) => bf_core::Error::Json(e),
            HistError::InvalidBinning(msg) => bf_core::Error::Validation(msg),
            HistError::BinningMismatch(msg) => bf_core::Error::DimensionMismatch(msg),
            HistError::NotFound { source_id, name } => {
                bf_core::Error::SourceNotFound { source_id, name }
            }
            e @ HistError::WrongKind { .. } => bf_core::Error::Validation(e.to_string()),
        }
    }
}
