use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use bf_folder::toy::{self, names};
use bf_folder::{AlgorithmKind, EfficiencyOptions, JetFolder, PriorParameters, RunMetadata, ToyConfig, UnfoldParameters};
use bf_hist::HistogramFile;

fn configured(src: &HistogramFile, algorithm: AlgorithmKind, mc_iterations: u64) -> JetFolder {
    let meta = RunMetadata::default();
    let mut f = JetFolder::in_memory();
    f.set_prior(src, names::PRIOR).unwrap();
    f.set_smeared(src, names::SMEARED).unwrap();
    f.set_measured(src, names::MEASURED).unwrap();
    f.set_response(src, names::RESPONSE).unwrap();
    f.set_efficiency(src, names::EFFICIENCY, EfficiencyOptions::default()).unwrap();
    f.set_event_info(meta.event).unwrap();
    f.set_trigger_info(meta.trigger).unwrap();
    f.set_jet_info(meta.jet).unwrap();
    f.set_prior_parameters(PriorParameters::default()).unwrap();
    f.set_unfold_parameters(UnfoldParameters { algorithm, mc_iterations, ..Default::default() }).unwrap();
    f
}

fn bench_backfold(c: &mut Criterion) {
    let cfg = ToyConfig { training_events: 200_000, data_events: 50_000, ..Default::default() };
    let src = toy::generate(&cfg).unwrap().to_file("bench.json");

    c.bench_function("toy_generate_100k", |b| {
        let small = ToyConfig { training_events: 100_000, data_events: 10_000, ..Default::default() };
        b.iter(|| black_box(toy::generate(&small).unwrap()))
    });

    c.bench_function("bayes_unfold_20x20", |b| {
        b.iter_batched(
            || {
                let mut f = configured(&src, AlgorithmKind::Bayesian, 100_000);
                f.init().unwrap();
                f
            },
            |mut f| black_box(f.unfold().unwrap()),
            BatchSize::SmallInput,
        )
    });

    for mc in [100_000u64, 1_000_000] {
        c.bench_function(&format!("backfold_{}k_draws", mc / 1000), |b| {
            b.iter_batched(
                || {
                    let mut f = configured(&src, AlgorithmKind::Bayesian, mc);
                    f.init().unwrap();
                    f.unfold().unwrap();
                    f
                },
                |mut f| black_box(f.backfold().unwrap()),
                BatchSize::SmallInput,
            )
        });
    }

    c.bench_function("full_run_svd", |b| {
        b.iter_batched(
            || configured(&src, AlgorithmKind::Svd, 100_000),
            |mut f| black_box(f.run().unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_backfold);
criterion_main!(benches);
