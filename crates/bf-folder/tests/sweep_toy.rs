//! Sweep over toy inputs: grid bookkeeping, duplicate skipping and output files.

use std::path::PathBuf;

use bf_folder::{AlgorithmKind, PriorFamily, RunInputs, SweepConfig, ToyConfig, UnfoldParameters, run_sweep, toy};
use bf_hist::{DistributionSource, HistogramFile};

fn scratch_dir(tag: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("bf_sweep_{}_{}", tag, std::process::id()));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn toy_inputs(dir: &std::path::Path) -> RunInputs {
    let path = dir.join("toy.json");
    let cfg = ToyConfig { training_events: 100_000, data_events: 20_000, ..Default::default() };
    toy::generate(&cfg).unwrap().write(&path).unwrap();
    RunInputs::from_file(
        &path,
        [toy::names::PRIOR, toy::names::SMEARED, toy::names::MEASURED, toy::names::RESPONSE, toy::names::EFFICIENCY],
    )
}

#[test]
fn sweep_runs_deduplicated_grid_and_writes_outputs() {
    let dir = scratch_dir("grid");
    let mut config = SweepConfig::new(dir.join("out"), toy_inputs(&dir));
    config.algorithms = vec![AlgorithmKind::None, AlgorithmKind::Bayesian, AlgorithmKind::BinByBin];
    config.regularization = vec![2, 3];
    config.priors = vec![PriorFamily::EmbeddingPassthrough, PriorFamily::Exponential];
    config.n_values = vec![5.0, 6.0];
    config.t_values = vec![2.0];
    config.unfold = UnfoldParameters { mc_iterations: 5_000, ..Default::default() };

    let summary = run_sweep(&config).unwrap();

    // Per prior shape: None once, Bayesian for both k, bin-by-bin once.
    // Neither prior uses n, so the second n value is skipped.
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert_eq!(summary.points.len(), 8);
    assert!(summary.best.is_some());
    assert_eq!(summary.best_per_prior.len(), 2);

    for p in &summary.points {
        let out = p.output.as_ref().unwrap();
        let f = HistogramFile::open(out).unwrap();
        assert!(f.load_1d("backfolded").is_ok(), "{}", out.display());
    }
    assert!(dir.join("out.summary.json").exists());
    assert!(dir.join("out.bestFiles.list").exists());

    let perf = HistogramFile::open(dir.join("out.p0n50t20.performance.json")).unwrap();
    let bayes = perf.load_1d("bayes_backfold").unwrap();
    assert_eq!(bayes.n_bins(), 2);
    assert!(bayes.bin_content.iter().all(|c| *c > 0.0));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sweep_records_failures_and_continues() {
    let dir = scratch_dir("fail");
    let mut config = SweepConfig::new(dir.join("out"), toy_inputs(&dir));
    // The measured spectrum cannot be used as a response.
    config.inputs.response.name = toy::names::MEASURED.to_string();
    config.algorithms = vec![AlgorithmKind::Bayesian];
    config.regularization = vec![2, 3];
    config.write_outputs = false;

    let summary = run_sweep(&config).unwrap();
    assert_eq!(summary.points.len(), 0);
    assert_eq!(summary.failures.len(), 2);
    assert!(summary.best.is_none());

    let _ = std::fs::remove_dir_all(&dir);
}
