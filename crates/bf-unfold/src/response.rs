//! Detector response built from a filled 2D histogram.
//!
//! Cell `(ix, iy)` of the source histogram counts events generated in
//! particle bin `iy` and reconstructed in detector bin `ix`.

use bf_core::{Error, Response, Result};
use bf_hist::Histogram2D;
use nalgebra::DMatrix;

/// Migration matrix plus the projections of the training sample.
#[derive(Debug, Clone)]
pub struct ResponseMatrix {
    reco_edges: Vec<f64>,
    truth_edges: Vec<f64>,
    counts: DMatrix<f64>,
    migration: DMatrix<f64>,
    truth: Vec<f64>,
    reco: Vec<f64>,
    purity: Vec<f64>,
    stability: Vec<f64>,
}

impl ResponseMatrix {
    /// Build from a response histogram (x = detector, y = particle).
    ///
    /// Columns are normalised to `P(reco i | truth j)`; empty columns stay
    /// zero.
    pub fn from_histogram(h: &Histogram2D) -> Result<Self> {
        h.validate()?;
        if h.bin_content.iter().any(|c| *c < 0.0) {
            return Err(Error::Validation(format!(
                "response '{}' has negative cells",
                h.name
            )));
        }
        let n_reco = h.n_x();
        let n_truth = h.n_y();
        let counts = DMatrix::from_fn(n_reco, n_truth, |i, j| h.content(i, j));

        let truth: Vec<f64> = (0..n_truth).map(|j| counts.column(j).sum()).collect();
        let reco: Vec<f64> = (0..n_reco).map(|i| counts.row(i).sum()).collect();

        let migration = DMatrix::from_fn(n_reco, n_truth, |i, j| {
            if truth[j] > 0.0 { counts[(i, j)] / truth[j] } else { 0.0 }
        });

        // Diagonal fractions; only meaningful for equal binning.
        let purity =
            (0..n_reco).map(|i| if reco[i] > 0.0 && i < n_truth { counts[(i, i)] / reco[i] } else { 0.0 }).collect();
        let stability = (0..n_truth)
            .map(|j| if truth[j] > 0.0 && j < n_reco { counts[(j, j)] / truth[j] } else { 0.0 })
            .collect();

        tracing::debug!(name = %h.name, n_reco, n_truth, entries = h.integral(), "response matrix built");

        Ok(Self {
            reco_edges: h.x_edges.clone(),
            truth_edges: h.y_edges.clone(),
            counts,
            migration,
            truth,
            reco,
            purity,
            stability,
        })
    }

    /// Detector-level bin edges.
    pub fn reco_edges(&self) -> &[f64] {
        &self.reco_edges
    }

    /// Particle-level bin edges.
    pub fn truth_edges(&self) -> &[f64] {
        &self.truth_edges
    }

    /// Raw event counts, shape `n_reco x n_truth`.
    pub fn counts(&self) -> &DMatrix<f64> {
        &self.counts
    }

    /// Purity per detector bin: fraction of its events from the same particle bin.
    pub fn purity(&self) -> &[f64] {
        &self.purity
    }

    /// Stability per particle bin: fraction of its events staying in the same detector bin.
    pub fn stability(&self) -> &[f64] {
        &self.stability
    }
}

impl Response for ResponseMatrix {
    fn n_reco(&self) -> usize {
        self.migration.nrows()
    }

    fn n_truth(&self) -> usize {
        self.migration.ncols()
    }

    fn migration(&self) -> &DMatrix<f64> {
        &self.migration
    }

    fn truth(&self) -> &[f64] {
        &self.truth
    }

    fn reco(&self) -> &[f64] {
        &self.reco
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn edges(n: usize) -> Vec<f64> {
        (0..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_columns_normalised() {
        let mut h = Histogram2D::new("r", edges(2), edges(2)).unwrap();
        h.set_content(0, 0, 80.0, 0.0);
        h.set_content(1, 0, 20.0, 0.0);
        h.set_content(0, 1, 20.0, 0.0);
        h.set_content(1, 1, 80.0, 0.0);
        let r = ResponseMatrix::from_histogram(&h).unwrap();
        assert_relative_eq!(r.migration()[(0, 0)], 0.8);
        assert_relative_eq!(r.migration()[(1, 0)], 0.2);
        assert_relative_eq!(r.migration().column(1).sum(), 1.0);
        assert_eq!(r.truth(), &[100.0, 100.0]);
        assert_relative_eq!(r.purity()[0], 0.8);
        assert_relative_eq!(r.stability()[1], 0.8);
    }

    #[test]
    fn test_empty_column_stays_zero() {
        let mut h = Histogram2D::new("r", edges(3), edges(2)).unwrap();
        h.set_content(1, 0, 5.0, 0.0);
        let r = ResponseMatrix::from_histogram(&h).unwrap();
        assert_eq!(r.n_reco(), 3);
        assert_eq!(r.n_truth(), 2);
        assert_eq!(r.migration().column(1).sum(), 0.0);
        assert_eq!(r.stability()[1], 0.0);
    }

    #[test]
    fn test_negative_cells_rejected() {
        let mut h = Histogram2D::new("r", edges(2), edges(2)).unwrap();
        h.set_content(0, 0, -1.0, 0.0);
        assert!(matches!(ResponseMatrix::from_histogram(&h), Err(Error::Validation(_))));
    }
}
