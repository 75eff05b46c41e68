//! Small matrix helpers shared by the solvers.

use bf_core::{Error, Measurement, Response, Result};
use nalgebra::{DMatrix, DVector};

/// Fail unless `measured` has one entry per detector bin.
pub(crate) fn check_measurement(response: &dyn Response, measured: &Measurement) -> Result<()> {
    if measured.len() != response.n_reco() {
        return Err(Error::DimensionMismatch(format!(
            "measurement has {} bins, response has {} detector bins",
            measured.len(),
            response.n_reco()
        )));
    }
    Ok(())
}

/// Diagonal covariance of the measurement.
pub(crate) fn measurement_covariance(measured: &Measurement) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_vec(measured.variances()))
}

/// `M V Mᵀ`.
pub(crate) fn propagate(m: &DMatrix<f64>, v: &DMatrix<f64>) -> DMatrix<f64> {
    m * v * m.transpose()
}

/// Inverse of a square matrix, falling back to the pseudo-inverse.
pub(crate) fn inverse_or_pinv(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if m.is_square()
        && let Some(inv) = m.clone().try_inverse()
        && inv.iter().all(|v| v.is_finite())
    {
        return Ok(inv);
    }
    m.clone()
        .pseudo_inverse(1e-12)
        .map_err(|e| Error::Computation(format!("pseudo-inverse failed: {}", e)))
}

/// Sample covariance of replica estimates.
pub(crate) fn sample_covariance(replicas: &[Vec<f64>], n: usize) -> DMatrix<f64> {
    let m = replicas.len();
    if m < 2 {
        return DMatrix::zeros(n, n);
    }
    let mut mean = vec![0.0; n];
    for r in replicas {
        for (acc, v) in mean.iter_mut().zip(r) {
            *acc += v;
        }
    }
    mean.iter_mut().for_each(|v| *v /= m as f64);
    DMatrix::from_fn(n, n, |i, j| {
        replicas.iter().map(|r| (r[i] - mean[i]) * (r[j] - mean[j])).sum::<f64>() / (m - 1) as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_propagate_scaling() {
        let m = DMatrix::from_diagonal_element(2, 2, 2.0);
        let v = DMatrix::from_diagonal_element(2, 2, 3.0);
        let out = propagate(&m, &v);
        assert_relative_eq!(out[(0, 0)], 12.0);
        assert_relative_eq!(out[(0, 1)], 0.0);
    }

    #[test]
    fn test_pinv_of_rectangular() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let p = inverse_or_pinv(&m).unwrap();
        assert_eq!(p.shape(), (2, 3));
        assert_relative_eq!((p * m)[(1, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_covariance() {
        let reps = vec![vec![1.0, 2.0], vec![3.0, 6.0]];
        let c = sample_covariance(&reps, 2);
        assert_relative_eq!(c[(0, 0)], 2.0);
        assert_relative_eq!(c[(0, 1)], 4.0);
        assert_relative_eq!(c[(1, 1)], 8.0);
    }
}
