//! Bin-by-bin correction factors `truth_j / reco_j`.

use bf_core::{Error, Measurement, Response, Result, UnfoldOutput, Unfolder};
use nalgebra::{DMatrix, DVector};

use crate::linalg::check_measurement;

/// Bin-by-bin unfolding. Needs equal detector and particle binning.
#[derive(Debug, Clone, Default)]
pub struct BinByBinUnfolder;

impl Unfolder for BinByBinUnfolder {
    fn unfold(&self, response: &dyn Response, measured: &Measurement) -> Result<UnfoldOutput> {
        check_measurement(response, measured)?;
        if response.n_reco() != response.n_truth() {
            return Err(Error::DimensionMismatch(format!(
                "bin-by-bin needs square response, got {}x{}",
                response.n_reco(),
                response.n_truth()
            )));
        }
        let factors: Vec<f64> = response
            .truth()
            .iter()
            .zip(response.reco())
            .map(|(t, r)| if *r > 0.0 { t / r } else { 0.0 })
            .collect();
        let estimate: Vec<f64> = factors.iter().zip(&measured.values).map(|(c, d)| c * d).collect();
        let variances = factors.iter().zip(&measured.errors).map(|(c, e)| (c * e).powi(2));
        let covariance = DMatrix::from_diagonal(&DVector::from_iterator(estimate.len(), variances));
        Ok(UnfoldOutput::new(estimate).with_covariance(covariance))
    }

    fn name(&self) -> &str {
        "bin_by_bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{identity_response, smeared_response};
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_passthrough() {
        let r = identity_response(&[10.0, 20.0]);
        let m = Measurement::new(vec![3.0, 4.0], vec![1.0, 2.0]).unwrap();
        let out = BinByBinUnfolder.unfold(&r, &m).unwrap();
        assert_eq!(out.estimate, vec![3.0, 4.0]);
        assert_relative_eq!(out.errors()[1], 2.0);
    }

    #[test]
    fn test_factors_from_projections() {
        let r = smeared_response(&[100.0, 50.0, 10.0], 0.2);
        let m = Measurement::new(r.reco().to_vec(), vec![1.0; 3]).unwrap();
        let out = BinByBinUnfolder.unfold(&r, &m).unwrap();
        for (u, t) in out.estimate.iter().zip(r.truth()) {
            assert_relative_eq!(*u, *t, max_relative = 1e-12);
        }
    }
}
