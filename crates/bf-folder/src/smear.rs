//! Forward smearing of particle-level values through the response.

use bf_hist::{BinSampler, Histogram2D};
use rand::Rng;

/// Draws a detector-level value for a particle-level value from the
/// response column of its particle bin.
#[derive(Debug, Clone)]
pub struct SmearingSampler {
    y_edges: Vec<f64>,
    columns: Vec<Option<BinSampler>>,
    detector_ceiling: f64,
}

impl SmearingSampler {
    /// Precompute one sampler per particle bin of `response`.
    pub fn new(response: &Histogram2D, detector_ceiling: f64) -> Self {
        let columns = (0..response.n_y())
            .map(|iy| BinSampler::from_bins(&response.x_edges, response.column(iy)))
            .collect();
        Self { y_edges: response.y_edges.clone(), columns, detector_ceiling }
    }

    /// Detector-level value for `particle`, or `None` when the particle bin is
    /// outside the response, its column is empty, or the draw exceeds the
    /// detector ceiling.
    #[inline]
    pub fn smear<R: Rng + ?Sized>(&self, particle: f64, rng: &mut R) -> Option<f64> {
        let iy = self.particle_bin(particle)?;
        let x = self.columns[iy].as_ref()?.sample(rng);
        (x <= self.detector_ceiling).then_some(x)
    }

    /// Whether the column for particle bin `iy` has any content.
    pub fn has_column(&self, iy: usize) -> bool {
        self.columns.get(iy).is_some_and(Option::is_some)
    }

    fn particle_bin(&self, y: f64) -> Option<usize> {
        let n = self.y_edges.len() - 1;
        if !y.is_finite() || y < self.y_edges[0] || y >= self.y_edges[n] {
            return None;
        }
        Some(self.y_edges.partition_point(|&e| e <= y) - 1)
    }
}
