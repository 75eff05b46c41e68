//! Run configuration: unfolding and prior parameters with their defaults.

use bf_core::{Error, Result};
use bf_prob::SpectralFamily;
use bf_unfold::{AlgorithmKind, AlgorithmSettings};
use serde::{Deserialize, Serialize};

pub use bf_prob::PION_MASS_GEV;

/// Default particle- and detector-level ceiling (GeV/c).
pub const DEFAULT_PARTICLE_CEILING: f64 = 100.0;

/// Default number of Monte-Carlo draws for backfolding and prior synthesis.
pub const DEFAULT_MC_ITERATIONS: u64 = 100_000;

/// Default number of toy replicas for the SVD covariance.
pub const DEFAULT_TOY_COUNT: u32 = 10;

/// Default regularization (Bayesian iterations / SVD rank).
pub const DEFAULT_REGULARIZATION: u32 = 4;

/// Default Monte-Carlo seed.
pub const DEFAULT_SEED: u64 = 42;

/// Draws per parallel Monte-Carlo chunk.
pub const MC_CHUNK_SIZE: u64 = 16_384;

/// Numeric unfolding configuration. Fixed once set on an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnfoldParameters {
    /// Algorithm to run.
    pub algorithm: AlgorithmKind,
    /// Bayesian iterations or SVD rank.
    pub regularization: u32,
    /// Monte-Carlo draws in backfolding and prior synthesis.
    pub mc_iterations: u64,
    /// SVD toy replicas (0 = analytic covariance).
    pub toy_count: u32,
    /// Unfolded bins with a low edge above this are zeroed.
    pub particle_ceiling: f64,
    /// Smeared values above this are treated as lost.
    pub detector_ceiling: f64,
    /// Seed for every random stream of the run.
    pub seed: u64,
    /// Fixed TUnfold τ; scanned when absent.
    pub tunfold_tau: Option<f64>,
}

impl Default for UnfoldParameters {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::Bayesian,
            regularization: DEFAULT_REGULARIZATION,
            mc_iterations: DEFAULT_MC_ITERATIONS,
            toy_count: DEFAULT_TOY_COUNT,
            particle_ceiling: DEFAULT_PARTICLE_CEILING,
            detector_ceiling: DEFAULT_PARTICLE_CEILING,
            seed: DEFAULT_SEED,
            tunfold_tau: None,
        }
    }
}

impl UnfoldParameters {
    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.particle_ceiling.is_nan() || self.detector_ceiling.is_nan() {
            return Err(Error::Validation("ceilings must not be NaN".into()));
        }
        if self.algorithm.is_regularized() && self.regularization == 0 {
            return Err(Error::Validation(format!(
                "{} needs regularization >= 1",
                self.algorithm
            )));
        }
        if self.algorithm != AlgorithmKind::None && self.mc_iterations == 0 {
            return Err(Error::Validation("mc_iterations must be > 0".into()));
        }
        if let Some(tau) = self.tunfold_tau
            && (!tau.is_finite() || tau < 0.0)
        {
            return Err(Error::Validation(format!("tunfold_tau must be finite and >= 0, got {}", tau)));
        }
        Ok(())
    }

    /// Solver settings derived from these parameters.
    pub fn algorithm_settings(&self) -> AlgorithmSettings {
        AlgorithmSettings {
            regularization: self.regularization,
            toy_count: self.toy_count,
            seed: self.seed,
            tau: self.tunfold_tau,
        }
    }
}

/// Prior shape used for the unfolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorFamily {
    /// Use the supplied (embedding) prior unchanged.
    #[default]
    EmbeddingPassthrough,
    /// Levy spectrum.
    Levy,
    /// Tsallis spectrum.
    Tsallis,
    /// Exponential spectrum.
    Exponential,
    /// Power-law spectrum.
    PowerLaw,
}

impl PriorFamily {
    /// All families, in sweep order.
    pub const ALL: [PriorFamily; 5] = [
        PriorFamily::EmbeddingPassthrough,
        PriorFamily::Levy,
        PriorFamily::Tsallis,
        PriorFamily::Exponential,
        PriorFamily::PowerLaw,
    ];

    /// Closed-form family, `None` for the passthrough prior.
    pub fn spectral(self) -> Option<SpectralFamily> {
        match self {
            PriorFamily::EmbeddingPassthrough => None,
            PriorFamily::Levy => Some(SpectralFamily::Levy),
            PriorFamily::Tsallis => Some(SpectralFamily::Tsallis),
            PriorFamily::Exponential => Some(SpectralFamily::Exponential),
            PriorFamily::PowerLaw => Some(SpectralFamily::PowerLaw),
        }
    }

    /// Whether the `n` shape parameter is used.
    pub fn uses_n(self) -> bool {
        matches!(self, PriorFamily::Levy | PriorFamily::Tsallis | PriorFamily::PowerLaw)
    }

    /// Whether the `t` shape parameter is used.
    pub fn uses_t(self) -> bool {
        matches!(self, PriorFamily::Levy | PriorFamily::Tsallis | PriorFamily::Exponential)
    }
}

impl std::fmt::Display for PriorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.spectral() {
            Some(s) => write!(f, "{}", s),
            None => f.write_str("Pythia"),
        }
    }
}

/// Prior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorParameters {
    /// Prior family.
    pub family: PriorFamily,
    /// Normalization `b` (the synthesized prior is renormalized anyway).
    pub normalization: f64,
    /// Particle mass for the Levy form (GeV/c²).
    pub mass: f64,
    /// Shape parameter `n`.
    pub n: f64,
    /// Shape parameter `t`.
    pub t: f64,
}

impl Default for PriorParameters {
    fn default() -> Self {
        Self {
            family: PriorFamily::EmbeddingPassthrough,
            normalization: 1.0,
            mass: PION_MASS_GEV,
            n: 5.0,
            t: 0.5,
        }
    }
}

impl PriorParameters {
    /// Shape parameters for `bf_prob`.
    pub fn shape(&self) -> bf_prob::ShapeParameters {
        bf_prob::ShapeParameters { normalization: self.normalization, mass: self.mass, n: self.n, t: self.t }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let p = UnfoldParameters::default();
        p.validate().unwrap();
        assert_eq!(p.mc_iterations, DEFAULT_MC_ITERATIONS);
        assert_eq!(p.toy_count, DEFAULT_TOY_COUNT);
        assert_eq!(PriorParameters::default().mass, 0.140);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = UnfoldParameters { regularization: 0, ..Default::default() };
        assert!(bad.validate().is_err());
        let ok = UnfoldParameters { regularization: 0, algorithm: AlgorithmKind::BinByBin, ..Default::default() };
        ok.validate().unwrap();
        let nan = UnfoldParameters { particle_ceiling: f64::NAN, ..Default::default() };
        assert!(nan.validate().is_err());
        let tau = UnfoldParameters { tunfold_tau: Some(-1.0), ..Default::default() };
        assert!(tau.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let p: UnfoldParameters = serde_json::from_str(r#"{"algorithm":"svd","regularization":3}"#).unwrap();
        assert_eq!(p.algorithm, AlgorithmKind::Svd);
        assert_eq!(p.regularization, 3);
        assert_eq!(p.particle_ceiling, DEFAULT_PARTICLE_CEILING);

        let q: PriorParameters = serde_json::from_str(r#"{"family":"power_law","n":6.0}"#).unwrap();
        assert_eq!(q.family, PriorFamily::PowerLaw);
        assert!(q.family.uses_n() && !q.family.uses_t());
    }
}
