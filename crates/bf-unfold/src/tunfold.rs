//! Tikhonov unfolding with first-derivative regularisation, in the manner of
//! TUnfold:
//!
//! `min (d - A x)ᵀ V⁻¹ (d - A x) + τ² |L x|²`
//!
//! When no τ is given it is chosen at the point of maximum curvature of the
//! L-curve `(log χ²_A, log |L x|²)`.

use bf_core::{Error, Measurement, Response, Result, UnfoldOutput, Unfolder};
use nalgebra::{DMatrix, DVector};

use crate::linalg::check_measurement;

/// Number of τ values in the L-curve scan.
const LCURVE_POINTS: usize = 40;

/// Lower end of the scan relative to the largest singular value.
const LCURVE_MIN_FRACTION: f64 = 1e-4;

/// Tikhonov-regularised unfolding.
#[derive(Debug, Clone, Default)]
pub struct TUnfoldUnfolder {
    tau: Option<f64>,
}

struct Solution {
    x: DVector<f64>,
    h_inv: DMatrix<f64>,
    chi2_a: f64,
    chi2_l: f64,
}

/// Discrete derivative operator, `(n - 1) x n`.
fn derivative_matrix(n: usize) -> DMatrix<f64> {
    let mut l = DMatrix::zeros(n.saturating_sub(1), n);
    for i in 0..n.saturating_sub(1) {
        l[(i, i)] = -1.0;
        l[(i, i + 1)] = 1.0;
    }
    l
}

impl TUnfoldUnfolder {
    /// Fixed `tau`, or `None` to scan the L-curve.
    pub fn new(tau: Option<f64>) -> Result<Self> {
        if let Some(t) = tau
            && (!t.is_finite() || t < 0.0)
        {
            return Err(Error::Validation(format!("tau must be finite and >= 0, got {}", t)));
        }
        Ok(Self { tau })
    }

    fn solve(
        a: &DMatrix<f64>,
        w: &DVector<f64>,
        l: &DMatrix<f64>,
        d: &DVector<f64>,
        tau: f64,
    ) -> Result<Solution> {
        let atw = DMatrix::from_fn(a.ncols(), a.nrows(), |j, i| a[(i, j)] * w[i]);
        let h = &atw * a + l.transpose() * l * (tau * tau);
        let h_inv = h
            .try_inverse()
            .ok_or_else(|| Error::Computation(format!("TUnfold normal matrix singular at tau = {}", tau)))?;
        let x = &h_inv * (&atw * d);
        let r = d - a * &x;
        let chi2_a = r.iter().zip(w.iter()).map(|(r, w)| r * r * w).sum();
        let chi2_l = (l * &x).norm_squared();
        Ok(Solution { x, h_inv, chi2_a, chi2_l })
    }

    fn scan(a: &DMatrix<f64>, w: &DVector<f64>, l: &DMatrix<f64>, d: &DVector<f64>) -> Result<f64> {
        let scaled = DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)] * w[i].sqrt());
        let s_max = scaled.singular_values().max();
        if s_max.is_nan() || s_max <= 0.0 {
            return Err(Error::Computation("response has no non-zero singular value".into()));
        }
        let (lo, hi) = ((s_max * LCURVE_MIN_FRACTION).ln(), s_max.ln());
        let taus: Vec<f64> = (0..LCURVE_POINTS)
            .map(|i| (lo + (hi - lo) * i as f64 / (LCURVE_POINTS - 1) as f64).exp())
            .collect();
        let mut curve = Vec::with_capacity(LCURVE_POINTS);
        for &tau in &taus {
            let s = Self::solve(a, w, l, d, tau)?;
            curve.push((s.chi2_a.max(f64::MIN_POSITIVE).ln(), s.chi2_l.max(f64::MIN_POSITIVE).ln()));
        }

        let mut best = (LCURVE_POINTS / 2, f64::NEG_INFINITY);
        for i in 1..LCURVE_POINTS - 1 {
            let (x0, y0) = curve[i - 1];
            let (x1, y1) = curve[i];
            let (x2, y2) = curve[i + 1];
            let (dx, dy) = ((x2 - x0) / 2.0, (y2 - y0) / 2.0);
            let (ddx, ddy) = (x2 - 2.0 * x1 + x0, y2 - 2.0 * y1 + y0);
            let kappa = (dx * ddy - dy * ddx) / (dx * dx + dy * dy).powf(1.5);
            if kappa.is_finite() && kappa > best.1 {
                best = (i, kappa);
            }
        }
        tracing::debug!(tau = taus[best.0], curvature = best.1, "L-curve scan");
        Ok(taus[best.0])
    }
}

impl Unfolder for TUnfoldUnfolder {
    fn unfold(&self, response: &dyn Response, measured: &Measurement) -> Result<UnfoldOutput> {
        check_measurement(response, measured)?;
        let a = response.migration();
        let w = DVector::from_iterator(measured.len(), measured.variances().iter().map(|v| 1.0 / v));
        let l = derivative_matrix(response.n_truth());
        let d = DVector::from_column_slice(&measured.values);

        let tau = match self.tau {
            Some(t) => t,
            None => Self::scan(a, &w, &l, &d)?,
        };
        let sol = Self::solve(a, &w, &l, &d, tau)?;

        // V_x = H⁻¹ Aᵀ W A H⁻¹
        let atwa = DMatrix::from_fn(a.ncols(), a.ncols(), |j, k| {
            (0..a.nrows()).map(|i| a[(i, j)] * w[i] * a[(i, k)]).sum()
        });
        let covariance = &sol.h_inv * atwa * &sol.h_inv;
        tracing::debug!(tau, chi2_a = sol.chi2_a, chi2_l = sol.chi2_l, "TUnfold done");
        Ok(UnfoldOutput::new(sol.x.as_slice().to_vec()).with_covariance(covariance))
    }

    fn name(&self) -> &str {
        "tunfold"
    }
}
