//! Common data types for backfold

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Checklist groups reported when required inputs are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputGroup {
    /// Prior, smeared, measured, response, efficiency.
    Spectra,
    /// Event, trigger and jet descriptions.
    Info,
    /// Prior and unfolding parameters.
    Parameters,
}

impl fmt::Display for InputGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputGroup::Spectra => "spectra",
            InputGroup::Info => "info",
            InputGroup::Parameters => "parameters",
        };
        f.write_str(s)
    }
}

/// Reduced chi-square between two binned distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chi2Score {
    /// Unreduced sum over contributing bins.
    pub sum: f64,
    /// Number of bins that contributed.
    pub n_bins: usize,
    /// `sum / n_bins`, or 0 when no bin contributed.
    pub reduced: f64,
    /// Upper-tail probability of `sum` for `n_bins` degrees of freedom.
    pub p_value: Option<f64>,
}

impl Chi2Score {
    /// Score with no contributing bins.
    pub fn empty() -> Self {
        Self { sum: 0.0, n_bins: 0, reduced: 0.0, p_value: None }
    }

    /// Whether at least one bin contributed. A zero `reduced` value is only a
    /// perfect fit when this is true.
    pub fn is_defined(&self) -> bool {
        self.n_bins > 0
    }
}

/// A measured spectrum handed to an unfolding algorithm.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Bin contents (reco level).
    pub values: Vec<f64>,
    /// Bin errors (reco level).
    pub errors: Vec<f64>,
}

impl Measurement {
    /// Create a measurement; `values` and `errors` must have equal length.
    pub fn new(values: Vec<f64>, errors: Vec<f64>) -> crate::Result<Self> {
        if values.len() != errors.len() {
            return Err(crate::Error::Validation(format!(
                "measurement values ({}) and errors ({}) differ in length",
                values.len(),
                errors.len()
            )));
        }
        Ok(Self { values, errors })
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no bins.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Per-bin variance used by the solvers.
    ///
    /// Bins without an error estimate fall back to Poisson `max(n, 1)` so the
    /// weight matrix stays invertible.
    pub fn variances(&self) -> Vec<f64> {
        self.values
            .iter()
            .zip(&self.errors)
            .map(|(&v, &e)| if e > 0.0 { e * e } else { v.abs().max(1.0) })
            .collect()
    }
}

/// Extra output exposed by SVD-type solvers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SvdDiagnostics {
    /// Singular values of the rescaled response, descending.
    pub singular_values: Vec<f64>,
    /// Absolute values of the rotated measurement (`|U^T b|`).
    pub d_vector: Vec<f64>,
}

/// Point estimate returned by an unfolding algorithm.
#[derive(Debug, Clone)]
pub struct UnfoldOutput {
    /// Unfolded (truth level) estimate.
    pub estimate: Vec<f64>,
    /// Covariance of the estimate, if the algorithm provides one.
    pub covariance: Option<DMatrix<f64>>,
    /// SVD diagnostics, only for SVD-type algorithms.
    pub diagnostics: Option<SvdDiagnostics>,
}

impl UnfoldOutput {
    /// Estimate without covariance or diagnostics.
    pub fn new(estimate: Vec<f64>) -> Self {
        Self { estimate, covariance: None, diagnostics: None }
    }

    /// Attach a covariance matrix.
    pub fn with_covariance(mut self, covariance: DMatrix<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Per-bin errors: sqrt of the covariance diagonal (0 without covariance).
    pub fn errors(&self) -> Vec<f64> {
        match &self.covariance {
            Some(cov) => (0..self.estimate.len())
                .map(|i| if i < cov.nrows() { cov[(i, i)].max(0.0).sqrt() } else { 0.0 })
                .collect(),
            None => vec![0.0; self.estimate.len()],
        }
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.estimate.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = cov[(i, i)].max(0.0).sqrt();
        let sigma_j = cov[(j, j)].max(0.0).sqrt();
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[(i, j)] / (sigma_i * sigma_j))
    }
}
