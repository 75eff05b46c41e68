//! Iterative Bayesian unfolding (D'Agostini).

use bf_core::{Error, Measurement, Response, Result, Unfolder};
use nalgebra::{DMatrix, DVector};

use crate::linalg::{check_measurement, measurement_covariance, propagate};

/// Bayesian unfolding with a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct BayesUnfolder {
    iterations: u32,
}

impl BayesUnfolder {
    /// `iterations` must be at least 1.
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(Error::Validation("Bayesian unfolding needs at least 1 iteration".into()));
        }
        Ok(Self { iterations })
    }

    /// Number of iterations.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Unfolding matrix `M[j][i] = P(truth j | reco i)` for the current prior.
fn unfolding_matrix(migration: &DMatrix<f64>, efficiency: &[f64], prior: &[f64]) -> DMatrix<f64> {
    let (n_reco, n_truth) = migration.shape();
    let mut m = DMatrix::zeros(n_truth, n_reco);
    for i in 0..n_reco {
        let norm: f64 = (0..n_truth).map(|j| migration[(i, j)] * prior[j]).sum();
        if norm <= 0.0 {
            continue;
        }
        for j in 0..n_truth {
            if efficiency[j] > 0.0 {
                m[(j, i)] = migration[(i, j)] * prior[j] / (efficiency[j] * norm);
            }
        }
    }
    m
}

impl Unfolder for BayesUnfolder {
    fn unfold(&self, response: &dyn Response, measured: &Measurement) -> Result<bf_core::UnfoldOutput> {
        check_measurement(response, measured)?;
        let migration = response.migration();
        let n_truth = response.n_truth();
        let efficiency: Vec<f64> = (0..n_truth).map(|j| migration.column(j).sum()).collect();

        let truth_total: f64 = response.truth().iter().sum();
        let mut prior: Vec<f64> = if truth_total > 0.0 {
            response.truth().iter().map(|t| t / truth_total).collect()
        } else {
            vec![1.0 / n_truth as f64; n_truth]
        };

        let data = DVector::from_column_slice(&measured.values);
        let mut m = unfolding_matrix(migration, &efficiency, &prior);
        let mut estimate = &m * &data;
        for iter in 1..self.iterations {
            let total = estimate.sum();
            if total <= 0.0 {
                tracing::warn!(iteration = iter, "Bayesian iteration reached zero total; stopping early");
                break;
            }
            prior = estimate.iter().map(|u| u / total).collect();
            m = unfolding_matrix(migration, &efficiency, &prior);
            estimate = &m * &data;
        }

        let covariance = propagate(&m, &measurement_covariance(measured));
        Ok(bf_core::UnfoldOutput::new(estimate.as_slice().to_vec()).with_covariance(covariance))
    }

    fn name(&self) -> &str {
        "bayes"
    }
}
