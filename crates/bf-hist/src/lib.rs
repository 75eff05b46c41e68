//! # bf-hist
//!
//! Binned distributions for backfold: 1D spectra, 2D response matrices,
//! weighted bin sampling, and JSON histogram files that act as the named
//! distribution source/sink of the engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod file;
pub mod histogram;
pub mod histogram2d;
pub mod sampler;

pub use error::{HistError, Result};
pub use file::{DistributionSink, DistributionSource, HistogramFile, StoredObject};
pub use histogram::Histogram1D;
pub use histogram2d::Histogram2D;
pub use sampler::BinSampler;
