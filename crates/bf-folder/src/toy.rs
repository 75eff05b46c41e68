//! Toy inputs: an exponential particle spectrum passed through a Gaussian
//! resolution and a turn-on efficiency.
//!
//! Produces the five spectra an engine needs, under the names used by
//! [`ToyInputs::write`], so runs can be exercised without analysis files.

use std::path::Path;

use bf_core::{Error, Result};
use bf_hist::{Histogram1D, Histogram2D, HistogramFile};
use rand::Rng;
use rand_distr::{Distribution, Exp, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::mc::{Stream, Tally, Tally2D, run_chunked};

/// Object names written by [`ToyInputs::write`].
pub mod names {
    /// Training particle-level spectrum.
    pub const PRIOR: &str = "hPrior";
    /// Training detector-level spectrum.
    pub const SMEARED: &str = "hSmeared";
    /// Pseudo-data.
    pub const MEASURED: &str = "hMeasured";
    /// Training response.
    pub const RESPONSE: &str = "hResponse";
    /// Training efficiency.
    pub const EFFICIENCY: &str = "hEfficiency";
}

/// Toy generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToyConfig {
    /// Bins on both levels.
    pub n_bins: usize,
    /// Lower edge (GeV/c).
    pub x_min: f64,
    /// Upper edge (GeV/c).
    pub x_max: f64,
    /// Exponential slope of the training spectrum (GeV/c).
    pub training_slope: f64,
    /// Exponential slope of the pseudo-data (GeV/c).
    pub data_slope: f64,
    /// Relative Gaussian resolution.
    pub resolution: f64,
    /// Absolute resolution floor (GeV/c).
    pub resolution_floor: f64,
    /// Efficiency plateau.
    pub plateau: f64,
    /// Efficiency turn-on scale (GeV/c).
    pub turn_on: f64,
    /// Training draws.
    pub training_events: u64,
    /// Pseudo-data draws.
    pub data_events: u64,
    /// Seed.
    pub seed: u64,
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self {
            n_bins: 20,
            x_min: 0.0,
            x_max: 40.0,
            training_slope: 5.0,
            data_slope: 4.5,
            resolution: 0.15,
            resolution_floor: 0.5,
            plateau: 0.85,
            turn_on: 3.0,
            training_events: 500_000,
            data_events: 50_000,
            seed: 1,
        }
    }
}

impl ToyConfig {
    // Binning is checked when the axis is built.
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.plateau) {
            return Err(Error::Validation(format!("toy plateau must be in [0, 1], got {}", self.plateau)));
        }
        if self.resolution < 0.0 || self.resolution_floor < 0.0 || self.turn_on <= 0.0 {
            return Err(Error::Validation("toy resolution and turn-on must be positive".into()));
        }
        Ok(())
    }

    fn efficiency_at(&self, p: f64) -> f64 {
        self.plateau * (1.0 - (-(p - self.x_min).max(0.0) / self.turn_on).exp())
    }

    fn smear<R: Rng + ?Sized>(&self, p: f64, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        p + z * (self.resolution * p + self.resolution_floor)
    }

    fn slope(&self, slope: f64) -> Result<Exp<f64>> {
        Exp::new(1.0 / slope).map_err(|e| Error::Validation(format!("toy slope {}: {}", slope, e)))
    }
}

/// The five generated spectra.
#[derive(Debug, Clone)]
pub struct ToyInputs {
    /// Training particle-level spectrum.
    pub prior: Histogram1D,
    /// Training detector-level spectrum (accepted events).
    pub smeared: Histogram1D,
    /// Pseudo-data at detector level.
    pub measured: Histogram1D,
    /// Training response (x = detector, y = particle).
    pub response: Histogram2D,
    /// accepted / generated per particle bin.
    pub efficiency: Histogram1D,
}

#[derive(Clone)]
struct TrainingTally {
    generated: Tally,
    accepted: Tally,
    smeared: Tally,
    response: Tally2D,
}

impl TrainingTally {
    fn merge(self, other: TrainingTally) -> TrainingTally {
        TrainingTally {
            generated: self.generated.merge(other.generated),
            accepted: self.accepted.merge(other.accepted),
            smeared: self.smeared.merge(other.smeared),
            response: self.response.merge(other.response),
        }
    }
}

/// Generate toy inputs.
pub fn generate(config: &ToyConfig) -> Result<ToyInputs> {
    config.validate()?;
    let axis = Histogram1D::uniform("axis", config.n_bins, config.x_min, config.x_max)?;
    let response_t = Histogram2D::new(names::RESPONSE, axis.bin_edges.clone(), axis.bin_edges.clone())?;
    let training = config.slope(config.training_slope)?;
    let data = config.slope(config.data_slope)?;

    let identity = || TrainingTally {
        generated: Tally::new(axis.n_bins()),
        accepted: Tally::new(axis.n_bins()),
        smeared: Tally::new(axis.n_bins()),
        response: Tally2D::new(&response_t),
    };
    let t = run_chunked(
        config.training_events,
        config.seed,
        Stream::ToyTraining,
        identity,
        |acc, rng, n| {
            for _ in 0..n {
                let p = config.x_min + training.sample(rng);
                acc.generated.fill(&axis, p);
                if rng.random::<f64>() >= config.efficiency_at(p) {
                    continue;
                }
                let s = config.smear(p, rng);
                acc.accepted.fill(&axis, p);
                acc.smeared.fill(&axis, s);
                acc.response.fill(&response_t, s, p);
            }
        },
        TrainingTally::merge,
    );

    let measured_tally = run_chunked(
        config.data_events,
        config.seed,
        Stream::ToyData,
        || Tally::new(axis.n_bins()),
        |acc, rng, n| {
            for _ in 0..n {
                let p = config.x_min + data.sample(rng);
                if rng.random::<f64>() < config.efficiency_at(p) {
                    let s = config.smear(p, rng);
                    acc.fill(&axis, s);
                }
            }
        },
        Tally::merge,
    );

    let mut prior = axis.empty_like(names::PRIOR);
    t.generated.apply_to(&mut prior);
    let mut accepted = axis.empty_like("accepted");
    t.accepted.apply_to(&mut accepted);
    let mut smeared = axis.empty_like(names::SMEARED);
    t.smeared.apply_to(&mut smeared);
    let mut response = response_t.clone();
    t.response.apply_to(&mut response);
    let mut measured = axis.empty_like(names::MEASURED);
    measured_tally.apply_to(&mut measured);
    let efficiency = Histogram1D::binomial_ratio(names::EFFICIENCY, &accepted, &prior)?;

    tracing::info!(
        training = config.training_events,
        accepted = accepted.entries,
        measured = measured.integral(),
        "toy inputs generated"
    );
    Ok(ToyInputs { prior, smeared, measured, response, efficiency })
}

impl ToyInputs {
    /// All five spectra in one histogram file under [`names`].
    pub fn to_file(&self, path: impl AsRef<Path>) -> HistogramFile {
        let mut f = HistogramFile::create(path);
        f.insert(self.prior.clone());
        f.insert(self.smeared.clone());
        f.insert(self.measured.clone());
        f.insert(self.response.clone());
        f.insert(self.efficiency.clone());
        f
    }

    /// Write [`ToyInputs::to_file`] to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_file(path).write()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_hist::DistributionSource;

    fn small() -> ToyConfig {
        ToyConfig { training_events: 60_000, data_events: 20_000, ..Default::default() }
    }

    #[test]
    fn test_generated_spectra_are_consistent() {
        let toy = generate(&small()).unwrap();
        assert_eq!(toy.prior.n_bins(), 20);
        assert_eq!(toy.response.n_x(), 20);
        // Response particle projection counts accepted events only.
        let accepted = toy.response.projection_y("py");
        for i in 0..20 {
            assert!(accepted.content(i) <= toy.prior.content(i));
            let eff = toy.efficiency.content(i);
            assert!((0.0..=1.0).contains(&eff), "bin {i}: {eff}");
        }
        assert!(toy.efficiency.content(10) > 0.7);
        assert!(toy.measured.integral() > 0.0);
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = generate(&small()).unwrap();
        let b = generate(&small()).unwrap();
        assert_eq!(a.measured, b.measured);
        assert_eq!(a.response, b.response);
    }

    #[test]
    fn test_file_has_expected_names() {
        let toy = generate(&ToyConfig { training_events: 5_000, data_events: 1_000, ..Default::default() }).unwrap();
        let f = toy.to_file("unused.json");
        assert!(f.load_1d(names::PRIOR).is_ok());
        assert!(f.load_2d(names::RESPONSE).is_ok());
        assert!(f.load_1d(names::EFFICIENCY).is_ok());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(generate(&ToyConfig { n_bins: 0, ..Default::default() }).is_err());
        assert!(generate(&ToyConfig { plateau: 1.5, ..Default::default() }).is_err());
    }
}
