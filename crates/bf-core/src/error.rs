//! Error types for backfold

use thiserror::Error;

use crate::types::InputGroup;

/// backfold error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Required inputs were not supplied before initialisation.
    #[error(
        "missing input ({}): {}",
        .groups.iter().map(|g| g.to_string()).collect::<Vec<_>>().join(", "),
        .missing.join(", ")
    )]
    MissingInput {
        /// Incomplete checklist groups.
        groups: Vec<InputGroup>,
        /// Names of the individual inputs that were never set.
        missing: Vec<String>,
    },

    /// A named distribution could not be located in its source.
    #[error("'{name}' not found in '{source_id}'")]
    SourceNotFound {
        /// Source identifier (usually a file path).
        source_id: String,
        /// Object name inside the source.
        name: String,
    },

    /// Two distributions have incompatible binning.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Monte Carlo sampling produced no usable draws.
    #[error("Sampling exhausted: {0}")]
    SamplingExhausted(String),

    /// An operation was called out of order.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_lists_groups() {
        let err = Error::MissingInput {
            groups: vec![InputGroup::Spectra, InputGroup::Parameters],
            missing: vec!["response".into(), "unfold parameters".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("spectra"), "{msg}");
        assert!(msg.contains("parameters"), "{msg}");
        assert!(msg.contains("response"), "{msg}");
    }
}
