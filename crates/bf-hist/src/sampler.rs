//! Draw x-values from a binned distribution with probability proportional to
//! bin content (uniform within the selected bin).

use rand::Rng;

/// Precomputed cumulative distribution over histogram bins.
///
/// Negative and non-finite bin contents carry zero weight.
#[derive(Debug, Clone)]
pub struct BinSampler {
    edges: Vec<f64>,
    cdf: Vec<f64>,
    total: f64,
}

impl BinSampler {
    /// Build from bin edges (`n + 1`) and weights (`n`).
    ///
    /// Returns `None` when the lengths disagree or no weight is positive.
    pub fn from_bins(edges: &[f64], weights: &[f64]) -> Option<Self> {
        if edges.len() != weights.len() + 1 || weights.is_empty() {
            return None;
        }
        let mut cdf = Vec::with_capacity(weights.len() + 1);
        let mut acc = 0.0;
        cdf.push(0.0);
        for &w in weights {
            if w.is_finite() && w > 0.0 {
                acc += w;
            }
            cdf.push(acc);
        }
        if acc <= 0.0 {
            return None;
        }
        for c in cdf.iter_mut() {
            *c /= acc;
        }
        let last = cdf.len() - 1;
        cdf[last] = 1.0;
        Some(Self { edges: edges.to_vec(), cdf, total: acc })
    }

    /// Sum of the positive weights.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Draw one value.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let r: f64 = rng.random();
        // cdf[0] == 0 <= r < 1 == cdf[n], so 1 <= idx <= n.
        let idx = self.cdf.partition_point(|&c| c <= r);
        let bin = idx.saturating_sub(1).min(self.cdf.len() - 2);
        let lo = self.cdf[bin];
        let hi = self.cdf[bin + 1];
        let frac = if hi > lo { (r - lo) / (hi - lo) } else { 0.5 };
        let x0 = self.edges[bin];
        x0 + frac * (self.edges[bin + 1] - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_empty_weights_give_none() {
        assert!(BinSampler::from_bins(&[0.0, 1.0, 2.0], &[0.0, 0.0]).is_none());
        assert!(BinSampler::from_bins(&[0.0, 1.0, 2.0], &[-1.0, f64::NAN]).is_none());
        assert!(BinSampler::from_bins(&[0.0, 1.0], &[1.0, 1.0]).is_none());
    }

    #[test]
    fn test_samples_only_populated_bins() {
        let s = BinSampler::from_bins(&[0.0, 1.0, 2.0, 3.0], &[0.0, 5.0, 0.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let x = s.sample(&mut rng);
            assert!((1.0..2.0).contains(&x), "x = {x}");
        }
    }

    #[test]
    fn test_sample_frequencies_follow_weights() {
        let s = BinSampler::from_bins(&[0.0, 1.0, 2.0], &[1.0, 3.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let n = 40_000;
        let upper = (0..n).filter(|_| s.sample(&mut rng) >= 1.0).count();
        let frac = upper as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.02, "frac = {frac}");
    }
}
