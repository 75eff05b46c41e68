//! Chunked, rayon-parallel Monte-Carlo loops with deterministic merging.
//!
//! Each chunk owns an RNG derived from `(seed, stream, chunk)` and fills
//! private unit-weight tallies; tallies are summed afterwards. Unit-weight
//! counts are exact in `f64`, so the result does not depend on the order of
//! the merge.

use bf_hist::{Histogram1D, Histogram2D};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::params::MC_CHUNK_SIZE;

/// Independent random streams of one run.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stream {
    PriorFill = 1,
    PriorFold = 2,
    Backfold = 3,
    ToyTraining = 4,
    ToyData = 5,
}

/// Same (seed, stream, chunk) gives the same draw sequence.
pub(crate) fn chunk_rng(seed: u64, stream: Stream, chunk: u64) -> StdRng {
    let salt = ((stream as u64) << 40) ^ chunk;
    StdRng::seed_from_u64(seed.wrapping_mul(2654435761).wrapping_add(salt))
}

/// Run `body(acc, rng, n_draws)` over `n` draws split into fixed chunks and
/// merge the per-chunk accumulators.
pub(crate) fn run_chunked<A, I, F, M>(n: u64, seed: u64, stream: Stream, identity: I, body: F, merge: M) -> A
where
    A: Send,
    I: Fn() -> A + Sync + Send,
    F: Fn(&mut A, &mut StdRng, u64) + Sync + Send,
    M: Fn(A, A) -> A + Sync + Send,
{
    let n_chunks = n.div_ceil(MC_CHUNK_SIZE);
    (0..n_chunks)
        .into_par_iter()
        .fold(&identity, |mut acc, c| {
            let start = c * MC_CHUNK_SIZE;
            let end = (start + MC_CHUNK_SIZE).min(n);
            let mut rng = chunk_rng(seed, stream, c);
            body(&mut acc, &mut rng, end - start);
            acc
        })
        .reduce(&identity, merge)
}

/// Unit-weight fills against a 1D binning.
#[derive(Debug, Clone)]
pub(crate) struct Tally {
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: f64,
}

impl Tally {
    pub(crate) fn new(n_bins: usize) -> Self {
        Self { bins: vec![0.0; n_bins], underflow: 0.0, overflow: 0.0, entries: 0.0 }
    }

    #[inline]
    pub(crate) fn fill(&mut self, template: &Histogram1D, x: f64) {
        if x.is_nan() {
            return;
        }
        self.entries += 1.0;
        match template.find_bin(x) {
            Some(i) => self.bins[i] += 1.0,
            None if x < template.x_min() => self.underflow += 1.0,
            None => self.overflow += 1.0,
        }
    }

    pub(crate) fn merge(mut self, other: Tally) -> Tally {
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        self
    }

    /// Add the counts to `h` (same binning as the template).
    pub(crate) fn apply_to(&self, h: &mut Histogram1D) {
        for (i, c) in self.bins.iter().enumerate() {
            h.bin_content[i] += c;
            h.sumw2[i] += c;
        }
        h.underflow += self.underflow;
        h.overflow += self.overflow;
        h.entries += self.entries;
    }
}

/// Unit-weight fills against a 2D binning.
#[derive(Debug, Clone)]
pub(crate) struct Tally2D {
    cells: Vec<f64>,
    entries: f64,
}

impl Tally2D {
    pub(crate) fn new(template: &Histogram2D) -> Self {
        Self { cells: vec![0.0; template.n_x() * template.n_y()], entries: 0.0 }
    }

    #[inline]
    pub(crate) fn fill(&mut self, template: &Histogram2D, x: f64, y: f64) {
        self.entries += 1.0;
        if let (Some(ix), Some(iy)) = (template.find_bin_x(x), template.find_bin_y(y)) {
            self.cells[iy * template.n_x() + ix] += 1.0;
        }
    }

    pub(crate) fn merge(mut self, other: Tally2D) -> Tally2D {
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a += b;
        }
        self.entries += other.entries;
        self
    }

    pub(crate) fn apply_to(&self, h: &mut Histogram2D) {
        for (k, c) in self.cells.iter().enumerate() {
            h.bin_content[k] += c;
            h.sumw2[k] += c;
        }
        h.entries += self.entries;
    }
}
