//! One-dimensional binned distribution with per-bin content and error.

use serde::{Deserialize, Serialize};

use crate::error::{HistError, Result};
use crate::sampler::BinSampler;

/// Relative tolerance when comparing bin edges of two histograms.
const EDGE_RTOL: f64 = 1e-9;

/// A 1D histogram.
///
/// Errors are stored as the sum of squared weights per bin, so
/// `error(i) = sqrt(sumw2[i])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    #[serde(default)]
    pub title: String,
    /// Bin edges (length = n_bins + 1, strictly increasing).
    pub bin_edges: Vec<f64>,
    /// Bin contents (length = n_bins, excluding under/overflow).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights filled below the first edge.
    #[serde(default)]
    pub underflow: f64,
    /// Sum of weights filled at or above the last edge.
    #[serde(default)]
    pub overflow: f64,
    /// Number of fill calls.
    #[serde(default)]
    pub entries: f64,
}

pub(crate) fn validate_edges(edges: &[f64], what: &str) -> Result<()> {
    if edges.len() < 2 {
        return Err(HistError::InvalidBinning(format!(
            "{what}: need at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(HistError::InvalidBinning(format!("{what}: non-finite bin edge")));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(HistError::InvalidBinning(format!("{what}: bin edges must be strictly increasing")));
    }
    Ok(())
}

pub(crate) fn edges_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= EDGE_RTOL * x.abs().max(y.abs()).max(1.0))
}

/// Index of the bin containing `x`, or `None` outside `[edges[0], edges[n])`.
pub(crate) fn locate(edges: &[f64], x: f64) -> Option<usize> {
    if !x.is_finite() || x < edges[0] || x >= edges[edges.len() - 1] {
        return None;
    }
    Some(edges.partition_point(|&e| e <= x) - 1)
}

impl Histogram1D {
    /// Empty histogram with explicit bin edges.
    pub fn new(name: impl Into<String>, bin_edges: Vec<f64>) -> Result<Self> {
        validate_edges(&bin_edges, "Histogram1D")?;
        let n = bin_edges.len() - 1;
        Ok(Self {
            name: name.into(),
            title: String::new(),
            bin_edges,
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0.0,
        })
    }

    /// Empty histogram with `n_bins` equal-width bins on `[x_min, x_max)`.
    pub fn uniform(name: impl Into<String>, n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(HistError::InvalidBinning("n_bins must be > 0".into()));
        }
        let width = (x_max - x_min) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| x_min + width * i as f64).collect();
        edges.push(x_max);
        Self::new(name, edges)
    }

    /// Histogram from explicit contents and errors.
    pub fn from_parts(
        name: impl Into<String>,
        bin_edges: Vec<f64>,
        bin_content: Vec<f64>,
        errors: Vec<f64>,
    ) -> Result<Self> {
        let mut h = Self::new(name, bin_edges)?;
        if bin_content.len() != h.n_bins() || errors.len() != h.n_bins() {
            return Err(HistError::InvalidBinning(format!(
                "'{}': {} bins but {} contents and {} errors",
                h.name,
                h.n_bins(),
                bin_content.len(),
                errors.len()
            )));
        }
        h.sumw2 = errors.iter().map(|e| e * e).collect();
        h.entries = bin_content.iter().filter(|c| **c != 0.0).count() as f64;
        h.bin_content = bin_content;
        Ok(h)
    }

    /// Check internal consistency (used after deserialisation).
    pub fn validate(&self) -> Result<()> {
        validate_edges(&self.bin_edges, &self.name)?;
        let n = self.bin_edges.len() - 1;
        if self.bin_content.len() != n || self.sumw2.len() != n {
            return Err(HistError::InvalidBinning(format!(
                "'{}': {} bins but {} contents and {} sumw2 entries",
                self.name,
                n,
                self.bin_content.len(),
                self.sumw2.len()
            )));
        }
        if self.sumw2.iter().any(|w| *w < 0.0) {
            return Err(HistError::InvalidBinning(format!("'{}': negative sumw2", self.name)));
        }
        Ok(())
    }

    /// Copy with a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut h = self.clone();
        h.name = name.into();
        h
    }

    /// Empty histogram with the same binning.
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        let mut h = self.renamed(name);
        h.title.clear();
        h.reset();
        h
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.bin_edges[0]
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.bin_edges[self.bin_edges.len() - 1]
    }

    /// Low edge of bin `i`.
    pub fn low_edge(&self, i: usize) -> f64 {
        self.bin_edges[i]
    }

    /// Width of bin `i`.
    pub fn width(&self, i: usize) -> f64 {
        self.bin_edges[i + 1] - self.bin_edges[i]
    }

    /// Centre of bin `i`.
    pub fn center(&self, i: usize) -> f64 {
        0.5 * (self.bin_edges[i] + self.bin_edges[i + 1])
    }

    /// Bin index containing `x`; `None` for under/overflow or non-finite `x`.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        locate(&self.bin_edges, x)
    }

    /// Content of bin `i`.
    pub fn content(&self, i: usize) -> f64 {
        self.bin_content[i]
    }

    /// Error of bin `i`.
    pub fn error(&self, i: usize) -> f64 {
        self.sumw2[i].sqrt()
    }

    /// All bin errors.
    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|w| w.sqrt()).collect()
    }

    /// Overwrite the content of bin `i`.
    pub fn set_content(&mut self, i: usize, value: f64) {
        self.bin_content[i] = value;
    }

    /// Overwrite the error of bin `i`.
    pub fn set_error(&mut self, i: usize, error: f64) {
        self.sumw2[i] = error * error;
    }

    /// Fill `x` with unit weight.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    /// Fill `x` with weight `w`. NaN is ignored; infinities go to the flows.
    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        if x.is_nan() {
            return;
        }
        self.entries += 1.0;
        match self.find_bin(x) {
            Some(i) => {
                self.bin_content[i] += w;
                self.sumw2[i] += w * w;
            }
            None if x < self.x_min() => self.underflow += w,
            None => self.overflow += w,
        }
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Sum of `content * width` over in-range bins.
    pub fn integral_width(&self) -> f64 {
        self.bin_content.iter().enumerate().map(|(i, c)| c * self.width(i)).sum()
    }

    /// Multiply contents by `factor` and errors by `|factor|`.
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for (c, w) in self.bin_content.iter_mut().zip(self.sumw2.iter_mut()) {
            *c *= factor;
            *w *= f2;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    /// Divide every bin's content and error by its width.
    pub fn scale_by_width(&mut self) {
        for i in 0..self.n_bins() {
            let w = self.width(i);
            self.bin_content[i] /= w;
            self.sumw2[i] /= w * w;
        }
    }

    /// Zero all contents, errors, flows and entries.
    pub fn reset(&mut self) {
        self.bin_content.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
        self.underflow = 0.0;
        self.overflow = 0.0;
        self.entries = 0.0;
    }

    /// Zero every bin error, keeping contents.
    pub fn clear_errors(&mut self) {
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
    }

    /// First bin whose content is strictly above `threshold`.
    pub fn first_bin_above(&self, threshold: f64) -> Option<usize> {
        self.bin_content.iter().position(|&c| c > threshold)
    }

    /// Last bin whose content is strictly above `threshold`.
    pub fn last_bin_above(&self, threshold: f64) -> Option<usize> {
        self.bin_content.iter().rposition(|&c| c > threshold)
    }

    /// Whether `other` has identical bin edges.
    pub fn same_binning(&self, other: &Histogram1D) -> bool {
        edges_match(&self.bin_edges, &other.bin_edges)
    }

    fn require_same_binning(&self, other: &Histogram1D, op: &str) -> Result<()> {
        if self.same_binning(other) {
            return Ok(());
        }
        Err(HistError::BinningMismatch(format!(
            "{op}: '{}' ({} bins on [{}, {}]) vs '{}' ({} bins on [{}, {}])",
            self.name,
            self.n_bins(),
            self.x_min(),
            self.x_max(),
            other.name,
            other.n_bins(),
            other.x_min(),
            other.x_max()
        )))
    }

    /// Bin-wise sum (contents, sumw2, flows, entries).
    pub fn add(&mut self, other: &Histogram1D) -> Result<()> {
        self.require_same_binning(other, "add")?;
        for i in 0..self.n_bins() {
            self.bin_content[i] += other.bin_content[i];
            self.sumw2[i] += other.sumw2[i];
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        Ok(())
    }

    /// Bin-wise division by `denominator`.
    ///
    /// Bins where the denominator content is zero are set to zero content and
    /// zero error instead of inf/NaN.
    pub fn divide(&mut self, denominator: &Histogram1D) -> Result<()> {
        self.require_same_binning(denominator, "divide")?;
        for i in 0..self.n_bins() {
            let c1 = self.bin_content[i];
            let c2 = denominator.bin_content[i];
            if c2 == 0.0 {
                self.bin_content[i] = 0.0;
                self.sumw2[i] = 0.0;
                continue;
            }
            let e1 = self.sumw2[i];
            let e2 = denominator.sumw2[i];
            let c2sq = c2 * c2;
            self.bin_content[i] = c1 / c2;
            self.sumw2[i] = (e1 * c2sq + e2 * c1 * c1) / (c2sq * c2sq);
        }
        Ok(())
    }

    /// Bin-wise multiplication by `other`.
    pub fn multiply(&mut self, other: &Histogram1D) -> Result<()> {
        self.require_same_binning(other, "multiply")?;
        for i in 0..self.n_bins() {
            let c1 = self.bin_content[i];
            let c2 = other.bin_content[i];
            self.sumw2[i] = self.sumw2[i] * c2 * c2 + other.sumw2[i] * c1 * c1;
            self.bin_content[i] = c1 * c2;
        }
        Ok(())
    }

    /// Efficiency-style ratio `numerator / denominator` with binomial errors.
    pub fn binomial_ratio(
        name: impl Into<String>,
        numerator: &Histogram1D,
        denominator: &Histogram1D,
    ) -> Result<Histogram1D> {
        numerator.require_same_binning(denominator, "binomial_ratio")?;
        let mut out = numerator.empty_like(name);
        for i in 0..out.n_bins() {
            let c1 = numerator.bin_content[i];
            let c2 = denominator.bin_content[i];
            if c2 == 0.0 {
                continue;
            }
            let r = c1 / c2;
            let e1 = numerator.sumw2[i];
            let e2 = denominator.sumw2[i];
            let var = ((1.0 - 2.0 * r) * e1 + r * r * e2) / (c2 * c2);
            out.bin_content[i] = r;
            out.sumw2[i] = var.abs();
        }
        out.entries = numerator.entries;
        Ok(out)
    }

    /// Sampler drawing x-values with probability proportional to bin content.
    ///
    /// Returns `None` when no bin has positive content.
    pub fn sampler(&self) -> Option<BinSampler> {
        BinSampler::from_bins(&self.bin_edges, &self.bin_content)
    }
}
