//! Output bundle of one engine run.

use std::path::Path;

use bf_core::{Chi2Score, Result};
use bf_hist::{DistributionSink, Histogram1D, Histogram2D, HistogramFile, StoredObject};
use serde::{Deserialize, Serialize};

/// Canonical object names in the output bundle.
pub mod names {
    /// Particle-level prior.
    pub const PRIOR: &str = "prior";
    /// Detector-level prior.
    pub const SMEARED: &str = "smeared";
    /// Measured spectrum.
    pub const MEASURED: &str = "measured";
    /// Unfolded spectrum.
    pub const UNFOLDED: &str = "unfolded";
    /// Particle-level draws of the backfold loop.
    pub const NORMALIZE: &str = "normalize";
    /// Backfolded spectrum.
    pub const BACKFOLDED: &str = "backfolded";
    /// Efficiency curve.
    pub const EFFICIENCY: &str = "efficiency";
    /// Response matrix.
    pub const RESPONSE: &str = "response";
    /// backfolded / measured.
    pub const RATIO_BACKFOLD_MEASURED: &str = "ratio_backfold_measured";
    /// unfolded / prior.
    pub const RATIO_UNFOLD_PRIOR: &str = "ratio_unfold_prior";
    /// smeared / measured.
    pub const RATIO_SMEAR_MEASURED: &str = "ratio_smear_measured";
    /// unfolded / measured.
    pub const RATIO_UNFOLD_MEASURED: &str = "ratio_unfold_measured";
    /// smeared / prior.
    pub const RATIO_SMEAR_PRIOR: &str = "ratio_smear_prior";
    /// Per-bin unfolding error.
    pub const UNFOLD_ERROR: &str = "unfold_error";
    /// Singular values of the rescaled response.
    pub const SINGULAR_VALUES: &str = "singular_values";
    /// Rotated measurement |d|.
    pub const D_VECTOR: &str = "d_vector";
    /// Correlation matrix of the unfolded bins.
    pub const PEARSON: &str = "pearson";
}

/// Monte-Carlo bookkeeping of the backfold loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackfoldStats {
    /// Draws from the unfolded spectrum.
    pub draws: u64,
    /// Draws whose smeared value was out of range.
    pub lost: u64,
}

impl BackfoldStats {
    /// Fraction of draws lost to out-of-range smearing.
    pub fn lost_fraction(&self) -> f64 {
        if self.draws == 0 { 0.0 } else { self.lost as f64 / self.draws as f64 }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct UnfoldingResult {
    /// Prior used for the run (synthesized when a spectral family was set).
    pub prior: Histogram1D,
    /// Detector-level prior.
    pub smeared: Histogram1D,
    /// Measured spectrum.
    pub measured: Histogram1D,
    /// Efficiency curve.
    pub efficiency: Histogram1D,
    /// Response matrix.
    pub response: Histogram2D,
    /// Unfolded spectrum.
    pub unfolded: Histogram1D,
    /// Backfolded spectrum.
    pub backfolded: Histogram1D,
    /// Particle-level draws of the backfold loop (absent for passthrough).
    pub normalize: Option<Histogram1D>,
    /// `chi2(prior, unfolded)`.
    pub chi2_unfold: Chi2Score,
    /// `chi2(measured, backfolded)`.
    pub chi2_backfold: Chi2Score,
    /// Diagnostic ratios under their canonical names.
    pub ratios: Vec<Histogram1D>,
    /// Per-bin unfolding error.
    pub unfold_error: Option<Histogram1D>,
    /// Singular values (a copy of the unfolded spectrum for non-SVD solvers).
    pub singular_values: Option<Histogram1D>,
    /// |d| vector (a copy of the unfolded spectrum for non-SVD solvers).
    pub d_vector: Option<Histogram1D>,
    /// Correlation matrix, when the solver provides a covariance.
    pub pearson: Option<Histogram2D>,
    /// Label lines built from the run metadata.
    pub labels: Vec<String>,
    /// Backfold bookkeeping.
    pub backfold_stats: BackfoldStats,
}

impl UnfoldingResult {
    /// Ratio by canonical name.
    pub fn ratio(&self, name: &str) -> Option<&Histogram1D> {
        self.ratios.iter().find(|h| h.name == name)
    }

    /// All distributions in persistence order.
    pub fn objects(&self) -> Vec<StoredObject> {
        let mut out: Vec<StoredObject> = vec![
            self.prior.clone().into(),
            self.smeared.clone().into(),
            self.measured.clone().into(),
            self.unfolded.clone().into(),
        ];
        if let Some(n) = &self.normalize {
            out.push(n.clone().into());
        }
        out.push(self.backfolded.clone().into());
        out.extend(self.ratios.iter().cloned().map(StoredObject::from));
        out.push(self.efficiency.clone().into());
        out.push(self.response.clone().into());
        for h in [&self.unfold_error, &self.singular_values, &self.d_vector].into_iter().flatten() {
            out.push(h.clone().into());
        }
        if let Some(p) = &self.pearson {
            out.push(p.clone().into());
        }
        out
    }

    /// Hand every distribution to `sink` and flush it.
    pub fn persist(&self, sink: &mut dyn DistributionSink) -> Result<()> {
        for obj in self.objects() {
            sink.persist(obj)?;
        }
        sink.flush()?;
        Ok(())
    }

    /// Write the bundle, labels and scores to a histogram file at `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = HistogramFile::create(path);
        file.set_metadata("labels", serde_json::to_value(&self.labels)?);
        file.set_metadata("chi2_unfold", serde_json::to_value(self.chi2_unfold)?);
        file.set_metadata("chi2_backfold", serde_json::to_value(self.chi2_backfold)?);
        file.set_metadata("backfold", serde_json::to_value(self.backfold_stats)?);
        self.persist(&mut file)?;
        tracing::info!(path = %path.display(), "output bundle written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_hist::DistributionSource;

    fn h(name: &str) -> Histogram1D {
        let mut h = Histogram1D::uniform(name, 3, 0.0, 3.0).unwrap();
        h.fill(0.5);
        h
    }

    fn result() -> UnfoldingResult {
        UnfoldingResult {
            prior: h(names::PRIOR),
            smeared: h(names::SMEARED),
            measured: h(names::MEASURED),
            efficiency: h(names::EFFICIENCY),
            response: Histogram2D::new(names::RESPONSE, vec![0.0, 1.0], vec![0.0, 1.0]).unwrap(),
            unfolded: h(names::UNFOLDED),
            backfolded: h(names::BACKFOLDED),
            normalize: None,
            chi2_unfold: Chi2Score::empty(),
            chi2_backfold: Chi2Score::empty(),
            ratios: vec![h(names::RATIO_BACKFOLD_MEASURED)],
            unfold_error: None,
            singular_values: None,
            d_vector: None,
            pearson: None,
            labels: vec!["pp collisions".into()],
            backfold_stats: BackfoldStats::default(),
        }
    }

    #[test]
    fn test_lost_fraction() {
        assert_eq!(BackfoldStats::default().lost_fraction(), 0.0);
        assert_eq!(BackfoldStats { draws: 4, lost: 1 }.lost_fraction(), 0.25);
    }

    #[test]
    fn test_write_bundle_with_canonical_names() {
        let mut path = std::env::temp_dir();
        path.push(format!("bf_folder_result_{}.json", std::process::id()));
        let r = result();
        r.write(&path).unwrap();

        let f = HistogramFile::open(&path).unwrap();
        assert!(f.load_1d(names::UNFOLDED).is_ok());
        assert!(f.load_1d(names::RATIO_BACKFOLD_MEASURED).is_ok());
        assert!(f.load_2d(names::RESPONSE).is_ok());
        assert!(f.load_1d(names::NORMALIZE).is_err());
        assert_eq!(f.metadata("labels").unwrap()[0], "pp collisions");
        assert!(r.ratio(names::RATIO_BACKFOLD_MEASURED).is_some());
        let _ = std::fs::remove_file(&path);
    }
}
