//! The unfolding/backfolding engine.
//!
//! A `JetFolder` is configured with five spectra, three metadata groups and
//! two parameter groups, then driven through
//! `init -> unfold -> backfold -> finish`. Every phase checks that the
//! previous one completed; calls out of order fail with
//! [`Error::Precondition`].

use std::path::PathBuf;

use bf_core::{Chi2Score, Error, Measurement, Result, Unfolder};
use bf_hist::{DistributionSource, Histogram1D, Histogram2D};
use bf_prob::SpectralDensity;
use bf_unfold::{AlgorithmKind, ResponseMatrix};

use crate::checklist::{RequiredInputChecklist, Requirement};
use crate::chi2::chi2;
use crate::efficiency::{self, EfficiencyOptions};
use crate::info::{EventInfo, JetInfo, TriggerInfo, build_labels};
use crate::mc::{Stream, Tally, run_chunked};
use crate::params::{PriorFamily, PriorParameters, UnfoldParameters};
use crate::prior::{PriorInputs, PriorSynthesizer, SynthesisReport};
use crate::ratio::{ratio, same_dimension};
use crate::result::{BackfoldStats, UnfoldingResult, names};
use crate::smear::SmearingSampler;

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Inputs are being supplied.
    Configuring,
    /// Inputs validated, response built.
    Initialized,
    /// Unfolded spectrum available.
    Unfolded,
    /// Backfolded spectrum available.
    Backfolded,
    /// Bundle assembled; terminal.
    Finished,
}

/// State fixed by `init`.
struct Prepared {
    params: UnfoldParameters,
    prior: Histogram1D,
    smeared: Histogram1D,
    measured: Histogram1D,
    efficiency: Histogram1D,
    response_hist: Histogram2D,
    response: ResponseMatrix,
    smearing: SmearingSampler,
    solver: Option<Box<dyn Unfolder>>,
}

struct UnfoldProducts {
    unfolded: Histogram1D,
    chi2: Chi2Score,
    unfold_error: Option<Histogram1D>,
    singular_values: Option<Histogram1D>,
    d_vector: Option<Histogram1D>,
    pearson: Option<Histogram2D>,
}

struct BackfoldProducts {
    backfolded: Histogram1D,
    normalize: Option<Histogram1D>,
    chi2: Chi2Score,
    stats: BackfoldStats,
}

#[derive(Clone)]
struct BackfoldTally {
    normalize: Tally,
    backfolded: Tally,
    lost: u64,
}

impl BackfoldTally {
    fn merge(self, other: BackfoldTally) -> BackfoldTally {
        BackfoldTally {
            normalize: self.normalize.merge(other.normalize),
            backfolded: self.backfolded.merge(other.backfolded),
            lost: self.lost + other.lost,
        }
    }
}

/// Unfolding/backfolding engine for one configuration.
pub struct JetFolder {
    output: Option<PathBuf>,
    phase: Phase,
    checklist: RequiredInputChecklist,

    prior: Option<Histogram1D>,
    smeared: Option<Histogram1D>,
    measured: Option<Histogram1D>,
    response: Option<Histogram2D>,
    efficiency: Option<Histogram1D>,
    event: Option<EventInfo>,
    trigger: Option<TriggerInfo>,
    jet: Option<JetInfo>,
    prior_params: Option<PriorParameters>,
    densities: Vec<SpectralDensity>,
    unfold_params: Option<UnfoldParameters>,

    prepared: Option<Prepared>,
    synthesis: Option<SynthesisReport>,
    unfolded: Option<UnfoldProducts>,
    backfolded: Option<BackfoldProducts>,
}

fn slot<'a, T>(value: &'a Option<T>, what: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| Error::Precondition(format!("{} is not available", what)))
}

impl JetFolder {
    /// Engine that writes its bundle to `output` on `finish`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self::with_output(Some(output.into()))
    }

    /// Engine that only returns its bundle from `finish`.
    pub fn in_memory() -> Self {
        Self::with_output(None)
    }

    fn with_output(output: Option<PathBuf>) -> Self {
        Self {
            output,
            phase: Phase::Configuring,
            checklist: RequiredInputChecklist::new(),
            prior: None,
            smeared: None,
            measured: None,
            response: None,
            efficiency: None,
            event: None,
            trigger: None,
            jet: None,
            prior_params: None,
            densities: Vec::new(),
            unfold_params: None,
            prepared: None,
            synthesis: None,
            unfolded: None,
            backfolded: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn require(&self, phase: Phase, op: &str) -> Result<()> {
        if self.phase != phase {
            return Err(Error::Precondition(format!(
                "{} requires phase {:?}, engine is {:?}",
                op, phase, self.phase
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    fn load_1d(&self, source: &dyn DistributionSource, name: &str, op: &str) -> Result<Histogram1D> {
        self.require(Phase::Configuring, op)?;
        let h = source.load_1d(name)?;
        tracing::debug!(source = %source.source_id(), name, bins = h.n_bins(), "{} loaded", op);
        Ok(h)
    }

    /// Load the particle-level prior.
    pub fn set_prior(&mut self, source: &dyn DistributionSource, name: &str) -> Result<()> {
        let h = self.load_1d(source, name, "set_prior")?;
        self.prior = Some(h.renamed(names::PRIOR));
        self.checklist.mark(Requirement::Prior);
        Ok(())
    }

    /// Load the detector-level prior.
    pub fn set_smeared(&mut self, source: &dyn DistributionSource, name: &str) -> Result<()> {
        let h = self.load_1d(source, name, "set_smeared")?;
        self.smeared = Some(h.renamed(names::SMEARED));
        self.checklist.mark(Requirement::Smeared);
        Ok(())
    }

    /// Load the measured spectrum.
    pub fn set_measured(&mut self, source: &dyn DistributionSource, name: &str) -> Result<()> {
        let h = self.load_1d(source, name, "set_measured")?;
        self.measured = Some(h.renamed(names::MEASURED));
        self.checklist.mark(Requirement::Measured);
        Ok(())
    }

    /// Load the response matrix (x = detector, y = particle).
    pub fn set_response(&mut self, source: &dyn DistributionSource, name: &str) -> Result<()> {
        self.require(Phase::Configuring, "set_response")?;
        let mut h = source.load_2d(name)?;
        tracing::debug!(source = %source.source_id(), name, n_x = h.n_x(), n_y = h.n_y(), "set_response loaded");
        h.name = names::RESPONSE.to_string();
        self.response = Some(h);
        self.checklist.mark(Requirement::Response);
        Ok(())
    }

    /// Load the efficiency curve and apply `options`.
    pub fn set_efficiency(
        &mut self,
        source: &dyn DistributionSource,
        name: &str,
        options: EfficiencyOptions,
    ) -> Result<()> {
        let mut h = self.load_1d(source, name, "set_efficiency")?.renamed(names::EFFICIENCY);
        efficiency::prepare(&mut h, &options)?;
        self.efficiency = Some(h);
        self.checklist.mark(Requirement::Efficiency);
        Ok(())
    }

    /// Beam and energy.
    pub fn set_event_info(&mut self, info: EventInfo) -> Result<()> {
        self.require(Phase::Configuring, "set_event_info")?;
        self.event = Some(info);
        self.checklist.mark(Requirement::EventInfo);
        Ok(())
    }

    /// Trigger selection.
    pub fn set_trigger_info(&mut self, info: TriggerInfo) -> Result<()> {
        self.require(Phase::Configuring, "set_trigger_info")?;
        self.trigger = Some(info);
        self.checklist.mark(Requirement::TriggerInfo);
        Ok(())
    }

    /// Jet definition.
    pub fn set_jet_info(&mut self, info: JetInfo) -> Result<()> {
        self.require(Phase::Configuring, "set_jet_info")?;
        self.jet = Some(info);
        self.checklist.mark(Requirement::JetInfo);
        Ok(())
    }

    /// Store the prior configuration and build one density per spectral
    /// family over the prior's bin range. The prior must be set first.
    ///
    /// A family whose parameters are invalid is only an error when it is the
    /// selected one.
    pub fn set_prior_parameters(&mut self, params: PriorParameters) -> Result<()> {
        self.require(Phase::Configuring, "set_prior_parameters")?;
        let prior = self
            .prior
            .as_ref()
            .ok_or_else(|| Error::Precondition("set_prior_parameters requires the prior to be set".into()))?;

        let mut densities = Vec::with_capacity(bf_prob::SpectralFamily::ALL.len());
        for family in bf_prob::SpectralFamily::ALL {
            match SpectralDensity::new(family, params.shape(), prior.x_min(), prior.x_max()) {
                Ok(d) => densities.push(d),
                Err(e) if params.family.spectral() == Some(family) => return Err(e),
                Err(e) => tracing::debug!(%family, error = %e, "density not built"),
            }
        }
        tracing::debug!(family = %params.family, n = params.n, t = params.t, "prior parameters set");
        self.densities = densities;
        self.prior_params = Some(params);
        self.checklist.mark(Requirement::PriorParameters);
        Ok(())
    }

    /// Store the unfolding configuration.
    pub fn set_unfold_parameters(&mut self, params: UnfoldParameters) -> Result<()> {
        self.require(Phase::Configuring, "set_unfold_parameters")?;
        params.validate()?;
        tracing::debug!(algorithm = %params.algorithm, k = params.regularization, n_mc = params.mc_iterations, "unfold parameters set");
        self.unfold_params = Some(params);
        self.checklist.mark(Requirement::UnfoldParameters);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Run
    // ---------------------------------------------------------------------

    /// Validate inputs, synthesize the prior if requested and build the
    /// response.
    pub fn init(&mut self) -> Result<()> {
        self.require(Phase::Configuring, "init")?;
        self.checklist.verify()?;

        let params = slot(&self.unfold_params, "unfold parameters")?.clone();
        let prior_params = slot(&self.prior_params, "prior parameters")?;
        let measured = slot(&self.measured, "measured")?.clone();
        let mut inputs = PriorInputs {
            prior: slot(&self.prior, "prior")?.clone(),
            smeared: slot(&self.smeared, "smeared")?.clone(),
            response: slot(&self.response, "response")?.clone(),
            efficiency: slot(&self.efficiency, "efficiency")?.clone(),
        };

        if let Some(family) = prior_params.family.spectral() {
            let density = self
                .densities
                .iter()
                .find(|d| d.family() == family)
                .ok_or_else(|| Error::Computation(format!("no {} density was built", family)))?;
            let smearing = SmearingSampler::new(&inputs.response, params.detector_ceiling);
            let report = PriorSynthesizer::new(
                density,
                &smearing,
                params.mc_iterations,
                params.particle_ceiling,
                params.seed,
            )
            .synthesize(&mut inputs, &measured)?;
            self.synthesis = Some(report);
        }

        let response = ResponseMatrix::from_histogram(&inputs.response)?;
        let smearing = SmearingSampler::new(&inputs.response, params.detector_ceiling);
        let solver = params.algorithm.build(&params.algorithm_settings())?;

        tracing::info!(
            algorithm = %params.algorithm,
            k = params.regularization,
            prior = %prior_params.family,
            n_reco = response.reco_edges().len() - 1,
            n_truth = response.truth_edges().len() - 1,
            "engine initialized"
        );

        self.prepared = Some(Prepared {
            params,
            prior: inputs.prior,
            smeared: inputs.smeared,
            measured,
            efficiency: inputs.efficiency,
            response_hist: inputs.response,
            response,
            smearing,
            solver,
        });
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Unfold the measured spectrum; returns `chi2(prior, unfolded)`.
    pub fn unfold(&mut self) -> Result<Chi2Score> {
        self.require(Phase::Initialized, "unfold")?;
        let p = slot(&self.prepared, "initialized state")?;

        let products = match &p.solver {
            None => {
                let unfolded = p.measured.renamed(names::UNFOLDED);
                let chi2 = chi2(&p.prior, &unfolded);
                UnfoldProducts {
                    unfolded,
                    chi2,
                    unfold_error: None,
                    singular_values: None,
                    d_vector: None,
                    pearson: None,
                }
            }
            Some(solver) => Self::run_solver(p, solver.as_ref())?,
        };

        if !products.chi2.is_defined() {
            tracing::warn!("chi2(prior, unfolded): no overlapping bins");
        }
        tracing::info!(
            algorithm = %p.params.algorithm,
            chi2 = products.chi2.reduced,
            n_bins = products.chi2.n_bins,
            integral = products.unfolded.integral(),
            "unfolded"
        );
        let chi2 = products.chi2;
        self.unfolded = Some(products);
        self.phase = Phase::Unfolded;
        Ok(chi2)
    }

    fn run_solver(p: &Prepared, solver: &dyn Unfolder) -> Result<UnfoldProducts> {
        let measurement = Measurement::new(p.measured.bin_content.clone(), p.measured.errors())?;
        let output = solver.unfold(&p.response, &measurement)?;
        let edges = p.response.truth_edges().to_vec();
        let n = edges.len() - 1;
        if output.estimate.len() != n {
            return Err(Error::Computation(format!(
                "{} returned {} bins for {} particle bins",
                solver.name(),
                output.estimate.len(),
                n
            )));
        }

        let errors = output.errors();
        let raw = Histogram1D::from_parts(names::UNFOLDED, edges.clone(), output.estimate.clone(), errors.clone())?;
        let unfold_error = Histogram1D::from_parts(names::UNFOLD_ERROR, edges.clone(), errors, vec![0.0; n])?;

        let pearson = match &output.covariance {
            Some(_) => {
                let mut m = Histogram2D::new(names::PEARSON, edges.clone(), edges)?;
                for i in 0..n {
                    for j in 0..n {
                        m.set_content(i, j, output.correlation(i, j).unwrap_or(0.0), 0.0);
                    }
                }
                Some(m)
            }
            None => None,
        };

        let (singular_values, d_vector) = match &output.diagnostics {
            Some(diag) => (
                Some(index_histogram(names::SINGULAR_VALUES, &diag.singular_values)?),
                Some(index_histogram(names::D_VECTOR, &diag.d_vector)?),
            ),
            None => (Some(raw.renamed(names::SINGULAR_VALUES)), Some(raw.renamed(names::D_VECTOR))),
        };

        let mut unfolded = raw;
        unfolded.divide(&p.efficiency)?;

        let ceiling = p.params.particle_ceiling;
        let mut truncated = 0usize;
        for i in 0..unfolded.n_bins() {
            if unfolded.low_edge(i) > ceiling {
                unfolded.set_content(i, 0.0);
                unfolded.set_error(i, 0.0);
                truncated += 1;
            }
        }
        tracing::debug!(solver = solver.name(), truncated, ceiling, "efficiency corrected and truncated");

        let chi2 = chi2(&p.prior, &unfolded);
        Ok(UnfoldProducts { unfolded, chi2, unfold_error: Some(unfold_error), singular_values, d_vector, pearson })
    }

    /// Fold the unfolded spectrum back to detector level; returns
    /// `chi2(measured, backfolded)`.
    pub fn backfold(&mut self) -> Result<Chi2Score> {
        self.require(Phase::Unfolded, "backfold")?;
        let p = slot(&self.prepared, "initialized state")?;
        let u = slot(&self.unfolded, "unfolded spectrum")?;

        let products = if p.params.algorithm == AlgorithmKind::None {
            let backfolded = p.measured.renamed(names::BACKFOLDED);
            let chi2 = chi2(&p.measured, &backfolded);
            BackfoldProducts { backfolded, normalize: None, chi2, stats: BackfoldStats::default() }
        } else {
            Self::run_backfold(p, &u.unfolded)?
        };

        if !products.chi2.is_defined() {
            tracing::warn!("chi2(measured, backfolded): no overlapping bins");
        }
        tracing::info!(
            chi2 = products.chi2.reduced,
            n_bins = products.chi2.n_bins,
            draws = products.stats.draws,
            lost = products.stats.lost,
            "backfolded"
        );
        let chi2 = products.chi2;
        self.backfolded = Some(products);
        self.phase = Phase::Backfolded;
        Ok(chi2)
    }

    fn run_backfold(p: &Prepared, unfolded: &Histogram1D) -> Result<BackfoldProducts> {
        let sampler = unfolded.sampler().ok_or_else(|| {
            Error::SamplingExhausted("unfolded spectrum has no positive content to sample".into())
        })?;
        let norm_t = unfolded.empty_like(names::NORMALIZE);
        let back_t = p.measured.empty_like(names::BACKFOLDED);
        let draws = p.params.mc_iterations;

        let identity =
            || BackfoldTally { normalize: Tally::new(norm_t.n_bins()), backfolded: Tally::new(back_t.n_bins()), lost: 0 };
        let tally = run_chunked(
            draws,
            p.params.seed,
            Stream::Backfold,
            identity,
            |acc, rng, n| {
                for _ in 0..n {
                    let u = sampler.sample(rng);
                    acc.normalize.fill(&norm_t, u);
                    match p.smearing.smear(u, rng) {
                        Some(b) => acc.backfolded.fill(&back_t, b),
                        None => acc.lost += 1,
                    }
                }
            },
            BackfoldTally::merge,
        );

        let mut normalize = norm_t.clone();
        tally.normalize.apply_to(&mut normalize);
        let mut backfolded = back_t.clone();
        tally.backfolded.apply_to(&mut backfolded);

        let stats = BackfoldStats { draws, lost: tally.lost };
        if stats.lost == draws {
            tracing::warn!(draws, "every backfold draw was lost to out-of-range smearing");
        } else if stats.lost > 0 {
            tracing::debug!(lost = stats.lost, fraction = stats.lost_fraction(), "backfold draws lost");
        }

        let i_unfolded = unfolded.integral();
        let i_normalize = normalize.integral();
        if i_unfolded > 0.0 {
            if i_normalize <= 0.0 {
                return Err(Error::SamplingExhausted(format!(
                    "normalization integral is {} after {} draws",
                    i_normalize, draws
                )));
            }
            backfolded.scale(i_unfolded / i_normalize);
        } else {
            tracing::warn!(integral = i_unfolded, "backfold rescale skipped: unfolded integral is not positive");
        }
        backfolded.multiply(&p.efficiency)?;

        let chi2 = chi2(&p.measured, &backfolded);
        Ok(BackfoldProducts { backfolded, normalize: Some(normalize), chi2, stats })
    }

    /// Compute ratios, assemble the bundle and persist it to the output, if
    /// one was configured.
    pub fn finish(&mut self) -> Result<UnfoldingResult> {
        self.require(Phase::Backfolded, "finish")?;
        let p = slot(&self.prepared, "initialized state")?;
        let u = slot(&self.unfolded, "unfolded spectrum")?;
        let b = slot(&self.backfolded, "backfolded spectrum")?;

        let mut ratios = vec![
            ratio(&b.backfolded, &p.measured, names::RATIO_BACKFOLD_MEASURED)?,
            ratio(&p.smeared, &p.measured, names::RATIO_SMEAR_MEASURED)?,
        ];
        if p.params.algorithm != AlgorithmKind::None {
            ratios.push(ratio(&u.unfolded, &p.prior, names::RATIO_UNFOLD_PRIOR)?);
        }
        if same_dimension(&u.unfolded, &p.measured) {
            ratios.push(ratio(&u.unfolded, &p.measured, names::RATIO_UNFOLD_MEASURED)?);
        }
        if same_dimension(&p.smeared, &p.prior) {
            ratios.push(ratio(&p.smeared, &p.prior, names::RATIO_SMEAR_PRIOR)?);
        }

        let mut labels = build_labels(self.event.as_ref(), self.trigger.as_ref(), self.jet.as_ref());
        if let Some(pp) = &self.prior_params {
            labels.push(run_label(&p.params, pp));
        }

        let result = UnfoldingResult {
            prior: p.prior.renamed(names::PRIOR),
            smeared: p.smeared.renamed(names::SMEARED),
            measured: p.measured.renamed(names::MEASURED),
            efficiency: p.efficiency.renamed(names::EFFICIENCY),
            response: {
                let mut r = p.response_hist.clone();
                r.name = names::RESPONSE.to_string();
                r
            },
            unfolded: u.unfolded.renamed(names::UNFOLDED),
            backfolded: b.backfolded.renamed(names::BACKFOLDED),
            normalize: b.normalize.clone(),
            chi2_unfold: u.chi2,
            chi2_backfold: b.chi2,
            ratios,
            unfold_error: u.unfold_error.clone(),
            singular_values: u.singular_values.clone(),
            d_vector: u.d_vector.clone(),
            pearson: u.pearson.clone(),
            labels,
            backfold_stats: b.stats,
        };

        if let Some(path) = &self.output {
            result.write(path)?;
        }
        tracing::info!(
            chi2_unfold = result.chi2_unfold.reduced,
            chi2_backfold = result.chi2_backfold.reduced,
            ratios = result.ratios.len(),
            "finished"
        );
        self.phase = Phase::Finished;
        Ok(result)
    }

    /// `init`, `unfold`, `backfold` and `finish` in sequence.
    pub fn run(&mut self) -> Result<UnfoldingResult> {
        self.init()?;
        self.unfold()?;
        self.backfold()?;
        self.finish()
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Prior in use (synthesized after `init` when a spectral family is set).
    pub fn prior(&self) -> Option<&Histogram1D> {
        self.prepared.as_ref().map(|p| &p.prior).or(self.prior.as_ref())
    }

    /// Efficiency in use.
    pub fn efficiency(&self) -> Option<&Histogram1D> {
        self.prepared.as_ref().map(|p| &p.efficiency).or(self.efficiency.as_ref())
    }

    /// Response histogram in use.
    pub fn response(&self) -> Option<&Histogram2D> {
        self.prepared.as_ref().map(|p| &p.response_hist).or(self.response.as_ref())
    }

    /// Prior synthesis report, when a spectral prior was generated.
    pub fn synthesis(&self) -> Option<&SynthesisReport> {
        self.synthesis.as_ref()
    }

    /// Unfolded spectrum after `unfold`.
    pub fn unfolded(&self) -> Option<&Histogram1D> {
        self.unfolded.as_ref().map(|u| &u.unfolded)
    }

    /// Backfolded spectrum after `backfold`.
    pub fn backfolded(&self) -> Option<&Histogram1D> {
        self.backfolded.as_ref().map(|b| &b.backfolded)
    }

    /// Normalization histogram of the backfold loop.
    pub fn normalize(&self) -> Option<&Histogram1D> {
        self.backfolded.as_ref().and_then(|b| b.normalize.as_ref())
    }

    /// Backfold bookkeeping after `backfold`.
    pub fn backfold_stats(&self) -> Option<BackfoldStats> {
        self.backfolded.as_ref().map(|b| b.stats)
    }
}

/// Uniform unit-width histogram holding one value per index.
fn index_histogram(name: &str, values: &[f64]) -> Result<Histogram1D> {
    let edges = (0..=values.len()).map(|i| i as f64).collect();
    Ok(Histogram1D::from_parts(name, edges, values.to_vec(), vec![0.0; values.len()])?)
}

fn run_label(params: &UnfoldParameters, prior: &PriorParameters) -> String {
    let mut s = format!("{}, k = {}, prior: {}", params.algorithm, params.regularization, prior.family);
    if prior.family != PriorFamily::EmbeddingPassthrough {
        if prior.family.uses_n() {
            s.push_str(&format!(", n = {:.1}", prior.n));
        }
        if prior.family.uses_t() {
            s.push_str(&format!(", t = {:.1}", prior.t));
        }
    }
    s
}
