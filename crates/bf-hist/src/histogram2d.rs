//! Two-dimensional binned distribution used for response matrices.
//!
//! Convention: x is the detector (reco) level, y is the particle (truth)
//! level. Cells are stored y-major, so the detector-level distribution for a
//! fixed particle bin is one contiguous slice.

use serde::{Deserialize, Serialize};

use crate::error::{HistError, Result};
use crate::histogram::{Histogram1D, edges_match, locate, validate_edges};

// Edges of a constructed Histogram2D are already validated.
fn zeroed(name: String, edges: &[f64]) -> Histogram1D {
    let n = edges.len() - 1;
    Histogram1D {
        name,
        title: String::new(),
        bin_edges: edges.to_vec(),
        bin_content: vec![0.0; n],
        sumw2: vec![0.0; n],
        underflow: 0.0,
        overflow: 0.0,
        entries: 0.0,
    }
}

/// A 2D histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    #[serde(default)]
    pub title: String,
    /// Detector-level bin edges.
    pub x_edges: Vec<f64>,
    /// Particle-level bin edges.
    pub y_edges: Vec<f64>,
    /// Contents, index `iy * n_x + ix`.
    pub bin_content: Vec<f64>,
    /// Sum of weights squared, same layout as `bin_content`.
    pub sumw2: Vec<f64>,
    /// Number of fill calls.
    #[serde(default)]
    pub entries: f64,
}

impl Histogram2D {
    /// Empty histogram with explicit edges.
    pub fn new(name: impl Into<String>, x_edges: Vec<f64>, y_edges: Vec<f64>) -> Result<Self> {
        validate_edges(&x_edges, "Histogram2D x-axis")?;
        validate_edges(&y_edges, "Histogram2D y-axis")?;
        let n = (x_edges.len() - 1) * (y_edges.len() - 1);
        Ok(Self {
            name: name.into(),
            title: String::new(),
            x_edges,
            y_edges,
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            entries: 0.0,
        })
    }

    /// Check internal consistency (used after deserialisation).
    pub fn validate(&self) -> Result<()> {
        validate_edges(&self.x_edges, &self.name)?;
        validate_edges(&self.y_edges, &self.name)?;
        let n = self.n_x() * self.n_y();
        if self.bin_content.len() != n || self.sumw2.len() != n {
            return Err(HistError::InvalidBinning(format!(
                "'{}': expected {} cells, got {} contents and {} sumw2 entries",
                self.name,
                n,
                self.bin_content.len(),
                self.sumw2.len()
            )));
        }
        if self.bin_content.iter().any(|c| !c.is_finite()) {
            return Err(HistError::InvalidBinning(format!(
                "'{}': cell contents must be finite",
                self.name
            )));
        }
        Ok(())
    }

    /// Empty histogram with the same binning.
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        let mut h = self.clone();
        h.name = name.into();
        h.title.clear();
        h.reset();
        h
    }

    /// Number of detector-level bins.
    pub fn n_x(&self) -> usize {
        self.x_edges.len() - 1
    }

    /// Number of particle-level bins.
    pub fn n_y(&self) -> usize {
        self.y_edges.len() - 1
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize) -> usize {
        iy * self.n_x() + ix
    }

    /// Detector-level bin containing `x`.
    pub fn find_bin_x(&self, x: f64) -> Option<usize> {
        locate(&self.x_edges, x)
    }

    /// Particle-level bin containing `y`.
    pub fn find_bin_y(&self, y: f64) -> Option<usize> {
        locate(&self.y_edges, y)
    }

    /// Content of cell `(ix, iy)`.
    pub fn content(&self, ix: usize, iy: usize) -> f64 {
        self.bin_content[self.index(ix, iy)]
    }

    /// Error of cell `(ix, iy)`.
    pub fn error(&self, ix: usize, iy: usize) -> f64 {
        self.sumw2[self.index(ix, iy)].sqrt()
    }

    /// Overwrite cell `(ix, iy)`.
    pub fn set_content(&mut self, ix: usize, iy: usize, value: f64, error: f64) {
        let k = self.index(ix, iy);
        self.bin_content[k] = value;
        self.sumw2[k] = error * error;
    }

    /// Fill `(x, y)` with unit weight. Out-of-range points are counted as
    /// entries but not stored.
    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.0);
    }

    /// Fill `(x, y)` with weight `w`.
    pub fn fill_weighted(&mut self, x: f64, y: f64, w: f64) {
        self.entries += 1.0;
        if let (Some(ix), Some(iy)) = (self.find_bin_x(x), self.find_bin_y(y)) {
            let k = self.index(ix, iy);
            self.bin_content[k] += w;
            self.sumw2[k] += w * w;
        }
    }

    /// Detector-level contents for particle bin `iy`.
    pub fn column(&self, iy: usize) -> &[f64] {
        let n_x = self.n_x();
        &self.bin_content[iy * n_x..(iy + 1) * n_x]
    }

    /// Sum of all cell contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Multiply all cells by `factor`.
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for (c, w) in self.bin_content.iter_mut().zip(self.sumw2.iter_mut()) {
            *c *= factor;
            *w *= f2;
        }
    }

    /// Zero all cells and entries.
    pub fn reset(&mut self) {
        self.bin_content.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
        self.entries = 0.0;
    }

    /// Cell-wise sum.
    pub fn add(&mut self, other: &Histogram2D) -> Result<()> {
        if !self.same_binning(other) {
            return Err(HistError::BinningMismatch(format!(
                "add: '{}' ({}x{}) vs '{}' ({}x{})",
                self.name,
                self.n_x(),
                self.n_y(),
                other.name,
                other.n_x(),
                other.n_y()
            )));
        }
        for k in 0..self.bin_content.len() {
            self.bin_content[k] += other.bin_content[k];
            self.sumw2[k] += other.sumw2[k];
        }
        self.entries += other.entries;
        Ok(())
    }

    /// Whether both axes have identical edges.
    pub fn same_binning(&self, other: &Histogram2D) -> bool {
        edges_match(&self.x_edges, &other.x_edges) && edges_match(&self.y_edges, &other.y_edges)
    }

    /// Detector-level projection (sum over particle bins).
    pub fn projection_x(&self, name: impl Into<String>) -> Histogram1D {
        let mut h = zeroed(name.into(), &self.x_edges);
        for iy in 0..self.n_y() {
            for ix in 0..self.n_x() {
                let k = self.index(ix, iy);
                h.bin_content[ix] += self.bin_content[k];
                h.sumw2[ix] += self.sumw2[k];
            }
        }
        h.entries = self.entries;
        h
    }

    /// Particle-level projection (sum over detector bins).
    pub fn projection_y(&self, name: impl Into<String>) -> Histogram1D {
        let mut h = zeroed(name.into(), &self.y_edges);
        for iy in 0..self.n_y() {
            for ix in 0..self.n_x() {
                let k = self.index(ix, iy);
                h.bin_content[iy] += self.bin_content[k];
                h.sumw2[iy] += self.sumw2[k];
            }
        }
        h.entries = self.entries;
        h
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
    fn test_fill_column_and_projections() {
        let mut r = Histogram2D::new("r", edges(3), edges(2)).unwrap();
        r.fill(0.5, 0.5);
        r.fill(1.5, 0.5);
        r.fill(1.5, 1.5);
        r.fill(5.0, 0.5);
        assert_eq!(r.column(0), &[1.0, 1.0, 0.0]);
        assert_eq!(r.column(1), &[0.0, 1.0, 0.0]);
        assert_eq!(r.entries, 4.0);
        let px = r.projection_x("px");
        let py = r.projection_y("py");
        assert_eq!(px.bin_content, vec![1.0, 2.0, 0.0]);
        assert_eq!(py.bin_content, vec![2.0, 1.0]);
        assert_relative_eq!(r.integral(), 3.0);
    }

    #[test]
    fn test_validate_rejects_non_finite_cells() {
        let mut r = Histogram2D::new("r", edges(2), edges(2)).unwrap();
        r.set_content(1, 1, -1.0, 0.0);
        assert!(r.validate().is_ok());
        r.set_content(0, 1, f64::INFINITY, 0.0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_add_requires_same_binning() {
        let mut a = Histogram2D::new("a", edges(2), edges(2)).unwrap();
        let b = Histogram2D::new("b", edges(3), edges(2)).unwrap();
        assert!(a.add(&b).is_err());
        let mut c = a.empty_like("c");
        c.fill(0.5, 1.5);
        a.add(&c).unwrap();
        assert_eq!(a.content(0, 1), 1.0);
    }
}
