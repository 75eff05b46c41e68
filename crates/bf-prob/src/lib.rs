//! Spectral densities for synthetic priors.
//!
//! This crate hosts the closed-form transverse-momentum spectra used to build
//! alternative priors:
//! - per-family density functions (`levy`, `tsallis`, `exponential`, `power_law`)
//! - `SpectralDensity`, one family bound to parameters and a support
//! - `InverseCdfSampler` for drawing values from any tabulated density

pub mod exponential;
pub mod levy;
pub mod power_law;
pub mod sampler;
pub mod spectrum;
pub mod tsallis;

pub use sampler::{DEFAULT_GRID_POINTS, InverseCdfSampler};
pub use spectrum::{ShapeParameters, SpectralDensity, SpectralFamily};

/// Charged-pion mass in GeV/c², the default Levy mass parameter.
pub const PION_MASS_GEV: f64 = 0.140;

pub(crate) fn check_shape(name: &str, value: f64) -> bf_core::Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(bf_core::Error::Validation(format!(
            "{} must be finite and > 0, got {}",
            name, value
        )));
    }
    Ok(())
}
