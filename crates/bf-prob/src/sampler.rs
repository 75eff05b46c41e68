//! Random draws from an arbitrary non-negative density by tabulated inverse
//! CDF (trapezoidal integration, linear interpolation between grid points).

use bf_core::{Error, Result};
use rand::Rng;

use crate::spectrum::SpectralDensity;

/// Default number of grid intervals.
pub const DEFAULT_GRID_POINTS: usize = 2000;

/// Tabulated inverse-CDF sampler.
#[derive(Debug, Clone)]
pub struct InverseCdfSampler {
    xs: Vec<f64>,
    cdf: Vec<f64>,
    total: f64,
}

impl InverseCdfSampler {
    /// Tabulate `f` on `n_points` equal intervals of `[x_min, x_max]`.
    ///
    /// Negative and non-finite values of `f` count as zero.
    pub fn from_fn<F>(f: F, x_min: f64, x_max: f64, n_points: usize) -> Result<Self>
    where
        F: Fn(f64) -> Result<f64>,
    {
        if n_points == 0 || x_min.is_nan() || x_max.is_nan() || x_max <= x_min {
            return Err(Error::Validation(format!(
                "inverse-CDF grid: need n_points > 0 and x_max > x_min, got {} on [{}, {}]",
                n_points, x_min, x_max
            )));
        }
        let step = (x_max - x_min) / n_points as f64;
        let mut xs = Vec::with_capacity(n_points + 1);
        let mut ys = Vec::with_capacity(n_points + 1);
        for i in 0..=n_points {
            let x = if i == n_points { x_max } else { x_min + step * i as f64 };
            let y = f(x)?;
            xs.push(x);
            ys.push(if y.is_finite() && y > 0.0 { y } else { 0.0 });
        }

        let mut cdf = Vec::with_capacity(n_points + 1);
        let mut acc = 0.0;
        cdf.push(0.0);
        for i in 0..n_points {
            acc += 0.5 * (ys[i] + ys[i + 1]) * (xs[i + 1] - xs[i]);
            cdf.push(acc);
        }
        if !acc.is_finite() || acc <= 0.0 {
            return Err(Error::Validation(format!(
                "density has no positive mass on [{}, {}]",
                x_min, x_max
            )));
        }
        for c in cdf.iter_mut() {
            *c /= acc;
        }
        cdf[n_points] = 1.0;
        Ok(Self { xs, cdf, total: acc })
    }

    /// Tabulate a spectral density over its own support.
    pub fn from_density(density: &SpectralDensity, n_points: usize) -> Result<Self> {
        let (lo, hi) = density.range();
        Self::from_fn(|x| density.eval(x), lo, hi, n_points)
    }

    /// Integral of the density over the grid.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Lower and upper grid bound.
    pub fn range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let r: f64 = rng.random();
        let idx = self.cdf.partition_point(|&c| c <= r);
        let i = idx.saturating_sub(1).min(self.cdf.len() - 2);
        let (c0, c1) = (self.cdf[i], self.cdf[i + 1]);
        let frac = if c1 > c0 { (r - c0) / (c1 - c0) } else { 0.5 };
        self.xs[i] + frac * (self.xs[i + 1] - self.xs[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{ShapeParameters, SpectralFamily};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_uniform_density_mean() {
        let s = InverseCdfSampler::from_fn(|_| Ok(2.0), 1.0, 3.0, 100).unwrap();
        assert!((s.total() - 4.0).abs() < 1e-12);
        let mut rng = StdRng::seed_from_u64(3);
        let n = 50_000;
        let mean = (0..n).map(|_| s.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.02, "mean = {mean}");
    }

    #[test]
    fn test_exponential_mean_matches_slope() {
        let params = ShapeParameters { normalization: 1.0, mass: 0.0, n: 0.0, t: 2.0 };
        let d = SpectralDensity::new(SpectralFamily::Exponential, params, 0.0, 60.0).unwrap();
        let s = InverseCdfSampler::from_density(&d, DEFAULT_GRID_POINTS).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let n = 100_000;
        let mean = (0..n).map(|_| s.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean = {mean}");
    }

    #[test]
    fn test_samples_stay_in_range() {
        let s = InverseCdfSampler::from_fn(|x| Ok(x * x), 0.5, 1.5, 50).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..5000 {
            let x = s.sample(&mut rng);
            assert!((0.5..=1.5).contains(&x));
        }
    }

    #[test]
    fn test_zero_density_rejected() {
        assert!(InverseCdfSampler::from_fn(|_| Ok(0.0), 0.0, 1.0, 10).is_err());
        assert!(InverseCdfSampler::from_fn(|_| Ok(-1.0), 0.0, 1.0, 10).is_err());
        assert!(InverseCdfSampler::from_fn(|_| Ok(1.0), 1.0, 1.0, 10).is_err());
    }
}
