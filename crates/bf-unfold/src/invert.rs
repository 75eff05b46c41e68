//! Direct inversion of the migration matrix (pseudo-inverse when not square
//! or singular). Unregularised.

use bf_core::{Measurement, Response, Result, UnfoldOutput, Unfolder};
use nalgebra::DVector;

use crate::linalg::{check_measurement, inverse_or_pinv, measurement_covariance, propagate};

/// Matrix-inversion unfolding.
#[derive(Debug, Clone, Default)]
pub struct InvertUnfolder;

impl Unfolder for InvertUnfolder {
    fn unfold(&self, response: &dyn Response, measured: &Measurement) -> Result<UnfoldOutput> {
        check_measurement(response, measured)?;
        let inv = inverse_or_pinv(response.migration())?;
        let estimate = &inv * DVector::from_column_slice(&measured.values);
        let covariance = propagate(&inv, &measurement_covariance(measured));
        Ok(UnfoldOutput::new(estimate.as_slice().to_vec()).with_covariance(covariance))
    }

    fn name(&self) -> &str {
        "invert"
    }
}
