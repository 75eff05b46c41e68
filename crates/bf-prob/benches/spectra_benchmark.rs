use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

use bf_prob::{InverseCdfSampler, ShapeParameters, SpectralDensity, SpectralFamily};

fn bench_spectra(c: &mut Criterion) {
    let xs: Vec<f64> = (1..10_000).map(|i| i as f64 * 0.005).collect();

    c.bench_function("levy_pdf_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += bf_prob::levy::pdf(x, 1.0, 0.14, 6.0, 0.4).unwrap();
            }
            black_box(acc)
        })
    });

    let params = ShapeParameters { normalization: 1.0, mass: 0.14, n: 6.0, t: 0.4 };
    let density = SpectralDensity::new(SpectralFamily::Tsallis, params, 0.2, 50.0).unwrap();
    c.bench_function("tsallis_tabulate_2000", |b| {
        b.iter(|| black_box(InverseCdfSampler::from_density(&density, 2000).unwrap()))
    });

    let sampler = InverseCdfSampler::from_density(&density, 2000).unwrap();
    c.bench_function("tsallis_sample_10k", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            let mut acc = 0.0;
            for _ in 0..10_000 {
                acc += sampler.sample(&mut rng);
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_spectra);
criterion_main!(benches);
