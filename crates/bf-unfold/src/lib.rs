//! # bf-unfold
//!
//! Response matrix and unfolding algorithms for backfold.
//!
//! Every solver implements [`bf_core::Unfolder`]; [`AlgorithmKind`] selects
//! one at run time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bayes;
pub mod bin_by_bin;
pub mod invert;
pub mod kind;
mod linalg;
pub mod response;
pub mod svd;
pub mod tunfold;

pub use bayes::BayesUnfolder;
pub use bin_by_bin::BinByBinUnfolder;
pub use invert::InvertUnfolder;
pub use kind::{AlgorithmKind, AlgorithmSettings};
pub use response::ResponseMatrix;
pub use svd::SvdUnfolder;
pub use tunfold::TUnfoldUnfolder;
