//! # bf-core
//!
//! Core types, traits, and error handling for backfold.
//!
//! This crate provides:
//! - Common error types
//! - Core traits (Response, Unfolder)
//! - Shared data structures (chi-square scores, solver output)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Response, Unfolder};
pub use types::{Chi2Score, InputGroup, Measurement, SvdDiagnostics, UnfoldOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
