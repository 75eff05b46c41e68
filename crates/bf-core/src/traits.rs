//! Core traits for backfold
//!
//! The engine talks to unfolding algorithms only through these traits, so the
//! folding logic does not depend on any concrete solver.

use nalgebra::DMatrix;

use crate::Result;
use crate::types::{Measurement, UnfoldOutput};

/// Detector response as seen by an unfolding algorithm.
pub trait Response: Send + Sync {
    /// Number of reco (detector) bins.
    fn n_reco(&self) -> usize;

    /// Number of truth (particle) bins.
    fn n_truth(&self) -> usize;

    /// Migration matrix `P(reco i | truth j)`, shape `n_reco x n_truth`.
    fn migration(&self) -> &DMatrix<f64>;

    /// Truth-level projection of the training sample.
    fn truth(&self) -> &[f64];

    /// Reco-level projection of the training sample.
    fn reco(&self) -> &[f64];
}

/// Unfolding algorithm
pub trait Unfolder: Send + Sync {
    /// Unfold `measured` through `response`.
    fn unfold(&self, response: &dyn Response, measured: &Measurement) -> Result<UnfoldOutput>;

    /// Algorithm name (e.g., "bayes", "svd")
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Diagonal {
        m: DMatrix<f64>,
        truth: Vec<f64>,
    }

    impl Response for Diagonal {
        fn n_reco(&self) -> usize {
            self.m.nrows()
        }

        fn n_truth(&self) -> usize {
            self.m.ncols()
        }

        fn migration(&self) -> &DMatrix<f64> {
            &self.m
        }

        fn truth(&self) -> &[f64] {
            &self.truth
        }

        fn reco(&self) -> &[f64] {
            &self.truth
        }
    }

    struct Passthrough;

    impl Unfolder for Passthrough {
        fn unfold(&self, _response: &dyn Response, measured: &Measurement) -> Result<UnfoldOutput> {
            Ok(UnfoldOutput::new(measured.values.clone()))
        }

        fn name(&self) -> &str {
            "Passthrough"
        }
    }

    #[test]
    fn test_passthrough_unfolder() {
        let r = Diagonal { m: DMatrix::identity(2, 2), truth: vec![1.0, 1.0] };
        let m = Measurement::new(vec![3.0, 4.0], vec![1.0, 2.0]).unwrap();
        let out = Passthrough.unfold(&r, &m).unwrap();
        assert_eq!(Passthrough.name(), "Passthrough");
        assert_eq!(out.estimate, vec![3.0, 4.0]);
        assert_eq!(r.n_truth(), 2);
    }
}
