//! # bf-folder
//!
//! Unfolding/backfolding engine for backfold.
//!
//! [`JetFolder`] owns the prior, smeared, measured, response and efficiency
//! distributions of one configuration and drives
//! `init -> unfold -> backfold -> finish`:
//! - prior synthesis from closed-form spectra ([`PriorSynthesizer`])
//! - unfolding through any [`bf_core::Unfolder`]
//! - Monte-Carlo backfolding through the response ([`SmearingSampler`])
//! - chi-square scoring ([`chi2()`]) and diagnostic ratios
//!
//! [`run_sweep`] scans algorithm × regularization × prior grids, and
//! [`toy::generate`] produces self-consistent toy inputs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checklist;
pub mod chi2;
pub mod efficiency;
pub mod folder;
pub mod info;
mod mc;
pub mod params;
pub mod prior;
pub mod ratio;
pub mod result;
pub mod smear;
pub mod sweep;
pub mod toy;

pub use checklist::{RequiredInputChecklist, Requirement};
pub use chi2::chi2;
pub use efficiency::{EfficiencyOptions, PlateauFit, PlateauSmoothing};
pub use folder::{JetFolder, Phase};
pub use info::{Beam, EventInfo, JetInfo, JetKind, TriggerInfo, TriggerKind};
pub use params::{
    DEFAULT_MC_ITERATIONS, DEFAULT_PARTICLE_CEILING, DEFAULT_REGULARIZATION, DEFAULT_SEED, DEFAULT_TOY_COUNT,
    PION_MASS_GEV, PriorFamily, PriorParameters, UnfoldParameters,
};
pub use prior::{PriorInputs, PriorSynthesizer, SynthesisReport};
pub use result::{BackfoldStats, UnfoldingResult};
pub use smear::SmearingSampler;
pub use sweep::{
    GridPoint, RunInputs, RunMetadata, SourceCache, SourceRef, SweepConfig, SweepFailure, SweepPoint,
    SweepSummary, run_sweep,
};
pub use toy::{ToyConfig, ToyInputs};

pub use bf_unfold::AlgorithmKind;
