//! Algorithm selection.

use std::fmt;
use std::str::FromStr;

use bf_core::{Error, Result, Unfolder};
use serde::{Deserialize, Serialize};

use crate::{BayesUnfolder, BinByBinUnfolder, InvertUnfolder, SvdUnfolder, TUnfoldUnfolder};

/// Which unfolding algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// No unfolding: the measured spectrum is passed through unchanged.
    #[default]
    None,
    /// Iterative Bayesian.
    Bayesian,
    /// SVD-regularised.
    Svd,
    /// Bin-by-bin correction factors.
    BinByBin,
    /// Tikhonov with derivative regularisation.
    TUnfold,
    /// Direct matrix inversion.
    MatrixInversion,
}

/// Parameters consumed by `AlgorithmKind::build`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmSettings {
    /// Iterations (Bayesian) or effective rank `k` (SVD).
    pub regularization: u32,
    /// Toy replicas for the SVD covariance.
    pub toy_count: u32,
    /// Seed for toy generation.
    pub seed: u64,
    /// Fixed TUnfold τ; scanned when `None`.
    pub tau: Option<f64>,
}

impl AlgorithmKind {
    /// All kinds, in sweep order.
    pub const ALL: [AlgorithmKind; 6] = [
        AlgorithmKind::None,
        AlgorithmKind::Bayesian,
        AlgorithmKind::Svd,
        AlgorithmKind::BinByBin,
        AlgorithmKind::TUnfold,
        AlgorithmKind::MatrixInversion,
    ];

    /// Whether the regularization parameter has any effect.
    pub fn is_regularized(self) -> bool {
        matches!(self, AlgorithmKind::Bayesian | AlgorithmKind::Svd)
    }

    /// Construct the solver, or `None` for the passthrough kind.
    pub fn build(self, settings: &AlgorithmSettings) -> Result<Option<Box<dyn Unfolder>>> {
        let solver: Box<dyn Unfolder> = match self {
            AlgorithmKind::None => return Ok(None),
            AlgorithmKind::Bayesian => Box::new(BayesUnfolder::new(settings.regularization)?),
            AlgorithmKind::Svd => {
                Box::new(SvdUnfolder::new(settings.regularization, settings.toy_count, settings.seed)?)
            }
            AlgorithmKind::BinByBin => Box::new(BinByBinUnfolder),
            AlgorithmKind::TUnfold => Box::new(TUnfoldUnfolder::new(settings.tau)?),
            AlgorithmKind::MatrixInversion => Box::new(InvertUnfolder),
        };
        Ok(Some(solver))
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlgorithmKind::None => "none",
            AlgorithmKind::Bayesian => "bayes",
            AlgorithmKind::Svd => "svd",
            AlgorithmKind::BinByBin => "bin_by_bin",
            AlgorithmKind::TUnfold => "tunfold",
            AlgorithmKind::MatrixInversion => "invert",
        };
        f.write_str(s)
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AlgorithmKind::None),
            "bayes" | "bayesian" => Ok(AlgorithmKind::Bayesian),
            "svd" => Ok(AlgorithmKind::Svd),
            "bin_by_bin" | "binbybin" => Ok(AlgorithmKind::BinByBin),
            "tunfold" => Ok(AlgorithmKind::TUnfold),
            "invert" | "inversion" | "matrix_inversion" => Ok(AlgorithmKind::MatrixInversion),
            other => Err(Error::Validation(format!("unknown algorithm '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AlgorithmSettings {
        AlgorithmSettings { regularization: 3, toy_count: 0, seed: 1, tau: None }
    }

    #[test]
    fn test_build_names() {
        assert!(AlgorithmKind::None.build(&settings()).unwrap().is_none());
        for kind in &AlgorithmKind::ALL[1..] {
            let solver = kind.build(&settings()).unwrap().unwrap();
            assert_eq!(solver.name(), kind.to_string());
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.to_string().parse::<AlgorithmKind>().unwrap(), kind);
        }
        assert!("simplex".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn test_zero_regularization_rejected_for_bayes() {
        let s = AlgorithmSettings { regularization: 0, ..settings() };
        assert!(AlgorithmKind::Bayesian.build(&s).is_err());
        assert!(AlgorithmKind::BinByBin.build(&s).is_ok());
    }
}
