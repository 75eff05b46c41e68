//! Spectral families evaluated over a fixed support.

use std::fmt;

use bf_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::{exponential, levy, power_law, tsallis};

/// Closed-form spectral shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralFamily {
    /// Levy with particle mass.
    Levy,
    /// Tsallis.
    Tsallis,
    /// Exponential.
    Exponential,
    /// Power law.
    PowerLaw,
}

impl SpectralFamily {
    /// All families, in label order.
    pub const ALL: [SpectralFamily; 4] = [
        SpectralFamily::Levy,
        SpectralFamily::Tsallis,
        SpectralFamily::Exponential,
        SpectralFamily::PowerLaw,
    ];
}

impl fmt::Display for SpectralFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpectralFamily::Levy => "Levy",
            SpectralFamily::Tsallis => "Tsallis",
            SpectralFamily::Exponential => "Exponential",
            SpectralFamily::PowerLaw => "Power law",
        };
        f.write_str(s)
    }
}

/// Shape parameters shared by all families. Each family reads the subset
/// it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeParameters {
    /// Overall normalization `b`.
    pub normalization: f64,
    /// Particle mass `m` (GeV/c², Levy only).
    pub mass: f64,
    /// Power `n` (Levy, Tsallis, power law).
    pub n: f64,
    /// Slope `t` (Levy, Tsallis, exponential).
    pub t: f64,
}

/// One evaluable density on `[x_min, x_max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDensity {
    family: SpectralFamily,
    params: ShapeParameters,
    x_min: f64,
    x_max: f64,
}

impl SpectralDensity {
    /// Build and validate a density; the parameters are checked by one
    /// evaluation at the lower bound.
    pub fn new(family: SpectralFamily, params: ShapeParameters, x_min: f64, x_max: f64) -> Result<Self> {
        if !(x_min.is_finite() && x_max.is_finite()) || x_max <= x_min {
            return Err(Error::Validation(format!(
                "{} density: invalid support [{}, {}]",
                family, x_min, x_max
            )));
        }
        let density = Self { family, params, x_min, x_max };
        density.eval(x_min)?;
        Ok(density)
    }

    /// Family of this density.
    pub fn family(&self) -> SpectralFamily {
        self.family
    }

    /// Parameters of this density.
    pub fn params(&self) -> &ShapeParameters {
        &self.params
    }

    /// Support `(x_min, x_max)`.
    pub fn range(&self) -> (f64, f64) {
        (self.x_min, self.x_max)
    }

    /// Density value at `x` (zero outside the support).
    pub fn eval(&self, x: f64) -> Result<f64> {
        if x < self.x_min || x > self.x_max {
            return Ok(0.0);
        }
        let p = &self.params;
        match self.family {
            SpectralFamily::Levy => levy::pdf(x, p.normalization, p.mass, p.n, p.t),
            SpectralFamily::Tsallis => tsallis::pdf(x, p.normalization, p.n, p.t),
            SpectralFamily::Exponential => exponential::pdf(x, p.normalization, p.t),
            SpectralFamily::PowerLaw => power_law::pdf(x, p.normalization, p.n),
        }
    }

    /// Same density restricted to `[x_min, min(x_max, ceiling)]`.
    pub fn truncated(&self, ceiling: f64) -> Result<Self> {
        Self::new(self.family, self.params, self.x_min, self.x_max.min(ceiling))
    }
}
