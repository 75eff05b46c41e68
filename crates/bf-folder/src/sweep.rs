//! Grid sweep over algorithm, regularization and prior shape.
//!
//! One engine runs per grid point. A failing point is logged and recorded,
//! and the sweep moves on. The best point (per prior shape and overall) is
//! the one whose backfold chi-square is closest to one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bf_core::{Chi2Score, Error, Result};
use bf_hist::{DistributionSink, Histogram1D, HistogramFile};
use bf_unfold::AlgorithmKind;
use serde::{Deserialize, Serialize};

use crate::efficiency::EfficiencyOptions;
use crate::folder::JetFolder;
use crate::info::{Beam, EventInfo, JetInfo, JetKind, TriggerInfo, TriggerKind};
use crate::params::{PriorFamily, PriorParameters, UnfoldParameters};
use crate::result::UnfoldingResult;

/// A named distribution in a histogram file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Histogram file.
    pub file: PathBuf,
    /// Object name inside the file.
    pub name: String,
}

impl SourceRef {
    /// `name` in `file`.
    pub fn new(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { file: file.into(), name: name.into() }
    }
}

/// The five input distributions of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    /// Particle-level prior.
    pub prior: SourceRef,
    /// Detector-level prior.
    pub smeared: SourceRef,
    /// Measured spectrum.
    pub measured: SourceRef,
    /// Response matrix.
    pub response: SourceRef,
    /// Efficiency curve.
    pub efficiency: SourceRef,
    /// Efficiency preparation.
    #[serde(default)]
    pub efficiency_options: EfficiencyOptions,
}

impl RunInputs {
    /// All five inputs taken from one file under the given names.
    pub fn from_file(file: impl AsRef<Path>, names: [&str; 5]) -> Self {
        let r = |n: &str| SourceRef::new(file.as_ref(), n);
        Self {
            prior: r(names[0]),
            smeared: r(names[1]),
            measured: r(names[2]),
            response: r(names[3]),
            efficiency: r(names[4]),
            efficiency_options: EfficiencyOptions::default(),
        }
    }

    fn refs(&self) -> [&SourceRef; 5] {
        [&self.prior, &self.smeared, &self.measured, &self.response, &self.efficiency]
    }
}

/// Run metadata shared by every grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Beam and energy.
    pub event: EventInfo,
    /// Trigger selection.
    pub trigger: TriggerInfo,
    /// Jet definition.
    pub jet: JetInfo,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            event: EventInfo { beam: Beam::Pp, energy_gev: 200.0 },
            trigger: TriggerInfo { kind: TriggerKind::Pi0, et_min: 9.0, et_max: 11.0, eta_max: 0.9 },
            jet: JetInfo { kind: JetKind::Charged, n_removed: 1, radius: 0.2, area_min: 0.05, constituent_pt_min: 0.2 },
        }
    }
}

/// Histogram files opened once and shared by all points.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: BTreeMap<PathBuf, HistogramFile>,
}

impl SourceCache {
    /// Open every file referenced by `inputs`.
    pub fn open(inputs: &RunInputs) -> Result<Self> {
        let mut files = BTreeMap::new();
        for r in inputs.refs() {
            if !files.contains_key(&r.file) {
                files.insert(r.file.clone(), HistogramFile::open(&r.file)?);
            }
        }
        Ok(Self { files })
    }

    fn get(&self, r: &SourceRef) -> Result<&HistogramFile> {
        self.files.get(&r.file).ok_or_else(|| Error::SourceNotFound {
            source_id: r.file.display().to_string(),
            name: r.name.clone(),
        })
    }

    /// Configure `folder` with all inputs, metadata and parameters.
    pub fn configure(
        &self,
        folder: &mut JetFolder,
        inputs: &RunInputs,
        metadata: &RunMetadata,
        prior: PriorParameters,
        unfold: UnfoldParameters,
    ) -> Result<()> {
        folder.set_prior(self.get(&inputs.prior)?, &inputs.prior.name)?;
        folder.set_smeared(self.get(&inputs.smeared)?, &inputs.smeared.name)?;
        folder.set_measured(self.get(&inputs.measured)?, &inputs.measured.name)?;
        folder.set_response(self.get(&inputs.response)?, &inputs.response.name)?;
        folder.set_efficiency(self.get(&inputs.efficiency)?, &inputs.efficiency.name, inputs.efficiency_options)?;
        folder.set_event_info(metadata.event.clone())?;
        folder.set_trigger_info(metadata.trigger.clone())?;
        folder.set_jet_info(metadata.jet.clone())?;
        folder.set_prior_parameters(prior)?;
        folder.set_unfold_parameters(unfold)?;
        Ok(())
    }
}

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Prefix of every output file.
    pub output_prefix: PathBuf,
    /// Input distributions.
    pub inputs: RunInputs,
    /// Run metadata.
    #[serde(default)]
    pub metadata: RunMetadata,
    /// Algorithms to run.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<AlgorithmKind>,
    /// Regularization values.
    #[serde(default = "default_regularization")]
    pub regularization: Vec<u32>,
    /// Prior families.
    #[serde(default = "default_priors")]
    pub priors: Vec<PriorFamily>,
    /// Values of the prior shape parameter `n`.
    #[serde(default = "default_n")]
    pub n_values: Vec<f64>,
    /// Values of the prior shape parameter `t`.
    #[serde(default = "default_t")]
    pub t_values: Vec<f64>,
    /// Prior normalization and mass; family, n and t come from the grid.
    #[serde(default)]
    pub prior: PriorParameters,
    /// Monte-Carlo, toy, ceiling and seed settings; algorithm and
    /// regularization come from the grid.
    #[serde(default)]
    pub unfold: UnfoldParameters,
    /// Write one bundle per point plus performance files.
    #[serde(default = "default_true")]
    pub write_outputs: bool,
}

fn default_algorithms() -> Vec<AlgorithmKind> {
    vec![AlgorithmKind::Bayesian, AlgorithmKind::Svd]
}

fn default_regularization() -> Vec<u32> {
    vec![2, 3, 4, 5]
}

fn default_priors() -> Vec<PriorFamily> {
    vec![PriorFamily::EmbeddingPassthrough]
}

fn default_n() -> Vec<f64> {
    vec![5.8]
}

fn default_t() -> Vec<f64> {
    vec![0.4]
}

fn default_true() -> bool {
    true
}

impl SweepConfig {
    /// Config with default grids for `inputs`.
    pub fn new(output_prefix: impl Into<PathBuf>, inputs: RunInputs) -> Self {
        Self {
            output_prefix: output_prefix.into(),
            inputs,
            metadata: RunMetadata::default(),
            algorithms: default_algorithms(),
            regularization: default_regularization(),
            priors: default_priors(),
            n_values: default_n(),
            t_values: default_t(),
            prior: PriorParameters { normalization: 0.1, ..Default::default() },
            unfold: UnfoldParameters::default(),
            write_outputs: true,
        }
    }

    fn validate(&self) -> Result<()> {
        let empty = [
            ("algorithms", self.algorithms.is_empty()),
            ("regularization", self.regularization.is_empty()),
            ("priors", self.priors.is_empty()),
            ("n_values", self.n_values.is_empty()),
            ("t_values", self.t_values.is_empty()),
        ];
        if let Some((what, _)) = empty.iter().find(|(_, e)| *e) {
            return Err(Error::Validation(format!("sweep grid '{}' is empty", what)));
        }
        Ok(())
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s = self.output_prefix.clone().into_os_string();
        s.push(suffix);
        PathBuf::from(s)
    }
}

/// One grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    /// Prior family.
    pub prior: PriorFamily,
    /// Algorithm.
    pub algorithm: AlgorithmKind,
    /// Regularization.
    pub regularization: u32,
    /// Prior shape `n`.
    pub n: f64,
    /// Prior shape `t`.
    pub t: f64,
}

fn prior_code(p: PriorFamily) -> usize {
    PriorFamily::ALL.iter().position(|q| *q == p).unwrap_or(0)
}

fn method_code(a: AlgorithmKind) -> usize {
    AlgorithmKind::ALL.iter().position(|q| *q == a).unwrap_or(0)
}

fn tenths(x: f64) -> i64 {
    (x * 10.0).round() as i64
}

impl GridPoint {
    /// File-name tag `p{prior}m{method}k{k}n{10n}t{10t}`.
    pub fn tag(&self) -> String {
        format!(
            "p{}m{}k{}n{}t{}",
            prior_code(self.prior),
            method_code(self.algorithm),
            self.regularization,
            tenths(self.n),
            tenths(self.t)
        )
    }
}

/// Outcome of a successful point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Grid coordinates.
    pub point: GridPoint,
    /// Bundle path, when outputs are written.
    pub output: Option<PathBuf>,
    /// `chi2(prior, unfolded)`.
    pub chi2_unfold: Chi2Score,
    /// `chi2(measured, backfolded)`.
    pub chi2_backfold: Chi2Score,
}

impl SweepPoint {
    /// `|chi2_backfold - 1|`; `None` when the backfold score is undefined.
    pub fn merit(&self) -> Option<f64> {
        self.chi2_backfold.is_defined().then(|| (self.chi2_backfold.reduced - 1.0).abs())
    }
}

/// A point that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// Grid coordinates.
    pub point: GridPoint,
    /// Error message.
    pub error: String,
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Successful points in run order.
    pub points: Vec<SweepPoint>,
    /// Failed points.
    pub failures: Vec<SweepFailure>,
    /// Index into `points` of the best point per prior tag (`p{prior}n{10n}t{10t}`).
    pub best_per_prior: BTreeMap<String, usize>,
    /// Index into `points` of the overall best point.
    pub best: Option<usize>,
}

impl SweepSummary {
    /// Overall best point.
    pub fn best_point(&self) -> Option<&SweepPoint> {
        self.best.and_then(|i| self.points.get(i))
    }

    fn record(&mut self, prior_tag: &str, point: SweepPoint) {
        let merit = point.merit();
        self.points.push(point);
        let idx = self.points.len() - 1;
        let Some(m) = merit else { return };
        let beats = |cur: Option<usize>, points: &[SweepPoint]| {
            cur.and_then(|i| points[i].merit()).is_none_or(|best| m < best)
        };
        if beats(self.best_per_prior.get(prior_tag).copied(), &self.points) {
            self.best_per_prior.insert(prior_tag.to_string(), idx);
        }
        if beats(self.best, &self.points) {
            self.best = Some(idx);
        }
    }
}

/// Chi-square versus regularization for the regularized algorithms.
struct Performance {
    histograms: Vec<Histogram1D>,
}

impl Performance {
    const NAMES: [&'static str; 4] = ["bayes_unfold", "bayes_backfold", "svd_unfold", "svd_backfold"];

    fn new(regularization: &[u32]) -> Result<Self> {
        let k_min = regularization.iter().copied().min().unwrap_or(1);
        let k_max = regularization.iter().copied().max().unwrap_or(1);
        let n = (k_max - k_min + 1) as usize;
        let histograms = Self::NAMES
            .iter()
            .map(|name| Histogram1D::uniform(*name, n, k_min as f64, (k_max + 1) as f64))
            .collect::<bf_hist::Result<Vec<_>>>()?;
        Ok(Self { histograms })
    }

    fn record(&mut self, point: &SweepPoint) {
        let offset = match point.point.algorithm {
            AlgorithmKind::Bayesian => 0,
            AlgorithmKind::Svd => 2,
            _ => return,
        };
        let k = point.point.regularization as f64;
        for (i, score) in [(offset, point.chi2_unfold.reduced), (offset + 1, point.chi2_backfold.reduced)] {
            let hist = &mut self.histograms[i];
            if let Some(bin) = hist.find_bin(k) {
                hist.set_content(bin, score);
                hist.set_error(bin, 0.0);
            }
        }
    }

    fn write(self, path: &Path) -> Result<()> {
        let mut f = HistogramFile::create(path);
        for h in self.histograms {
            f.persist(h.into())?;
        }
        f.flush()?;
        Ok(())
    }
}

/// Run every point of the grid.
///
/// Only configuration errors and unreadable input files abort the sweep;
/// per-point errors are collected in [`SweepSummary::failures`].
pub fn run_sweep(config: &SweepConfig) -> Result<SweepSummary> {
    config.validate()?;
    let sources = SourceCache::open(&config.inputs)?;
    let mut summary = SweepSummary::default();

    for &prior in &config.priors {
        for (n_idx, &n) in config.n_values.iter().enumerate() {
            for (t_idx, &t) in config.t_values.iter().enumerate() {
                if (!prior.uses_n() && n_idx > 0) || (!prior.uses_t() && t_idx > 0) {
                    continue;
                }
                let prior_tag = format!("p{}n{}t{}", prior_code(prior), tenths(n), tenths(t));
                let mut performance = Performance::new(&config.regularization)?;

                for &algorithm in &config.algorithms {
                    for (k_idx, &k) in config.regularization.iter().enumerate() {
                        if !algorithm.is_regularized() && k_idx > 0 {
                            continue;
                        }
                        let point = GridPoint { prior, algorithm, regularization: k, n, t };
                        match run_point(config, &sources, point) {
                            Ok(done) => {
                                tracing::info!(
                                    tag = %point.tag(),
                                    chi2_unfold = done.chi2_unfold.reduced,
                                    chi2_backfold = done.chi2_backfold.reduced,
                                    "sweep point done"
                                );
                                performance.record(&done);
                                summary.record(&prior_tag, done);
                            }
                            Err(e) => {
                                tracing::warn!(tag = %point.tag(), error = %e, "sweep point failed");
                                summary.failures.push(SweepFailure { point, error: e.to_string() });
                            }
                        }
                    }
                }

                if config.write_outputs {
                    performance.write(&config.with_suffix(&format!(".{}.performance.json", prior_tag)))?;
                }
            }
        }
    }

    if config.write_outputs {
        write_summary(config, &summary)?;
    }
    if let Some(best) = summary.best_point() {
        tracing::info!(tag = %best.point.tag(), chi2_backfold = best.chi2_backfold.reduced, "best point");
    }
    Ok(summary)
}

fn run_point(config: &SweepConfig, sources: &SourceCache, point: GridPoint) -> Result<SweepPoint> {
    let output = config.write_outputs.then(|| config.with_suffix(&format!(".{}.json", point.tag())));
    let mut folder = match &output {
        Some(path) => JetFolder::new(path),
        None => JetFolder::in_memory(),
    };
    let prior = PriorParameters { family: point.prior, n: point.n, t: point.t, ..config.prior.clone() };
    let unfold =
        UnfoldParameters { algorithm: point.algorithm, regularization: point.regularization, ..config.unfold.clone() };
    sources.configure(&mut folder, &config.inputs, &config.metadata, prior, unfold)?;
    let result: UnfoldingResult = folder.run()?;
    Ok(SweepPoint { point, output, chi2_unfold: result.chi2_unfold, chi2_backfold: result.chi2_backfold })
}

fn write_summary(config: &SweepConfig, summary: &SweepSummary) -> Result<()> {
    let path = config.with_suffix(".summary.json");
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_vec_pretty(summary)?)?;

    // Best bundle per prior, one path per line.
    let best: Vec<String> = summary
        .best_per_prior
        .values()
        .filter_map(|&i| summary.points[i].output.as_ref())
        .map(|p| p.display().to_string())
        .collect();
    std::fs::write(config.with_suffix(".bestFiles.list"), best.join("\n") + "\n")?;
    tracing::info!(path = %path.display(), points = summary.points.len(), failures = summary.failures.len(), "sweep summary written");
    Ok(())
}
