//! Diagnostic ratios between two spectra.

use bf_core::{Error, Result};
use bf_hist::Histogram1D;

/// Whether `a` and `b` share bin count and outer bounds.
pub fn same_dimension(a: &Histogram1D, b: &Histogram1D) -> bool {
    a.n_bins() == b.n_bins() && a.x_min() == b.x_min() && a.x_max() == b.x_max()
}

/// `a / b` bin by bin, named `name`.
///
/// Bins where either content is not positive stay empty. Errors combine the
/// relative errors in quadrature.
pub fn ratio(a: &Histogram1D, b: &Histogram1D, name: &str) -> Result<Histogram1D> {
    if !same_dimension(a, b) {
        return Err(Error::DimensionMismatch(format!(
            "ratio '{}': '{}' has {} bins on [{}, {}], '{}' has {} bins on [{}, {}]",
            name,
            a.name,
            a.n_bins(),
            a.x_min(),
            a.x_max(),
            b.name,
            b.n_bins(),
            b.x_min(),
            b.x_max()
        )));
    }
    let mut r = a.empty_like(name);
    let mut filled = 0usize;
    for i in 0..a.n_bins() {
        let (ya, yb) = (a.content(i), b.content(i));
        if ya <= 0.0 || yb <= 0.0 {
            continue;
        }
        let value = ya / yb;
        let rel = ((a.error(i) / ya).powi(2) + (b.error(i) / yb).powi(2)).sqrt();
        let Some(k) = r.find_bin(a.center(i)) else { continue };
        r.set_content(k, value);
        r.set_error(k, value * rel);
        filled += 1;
    }
    r.entries = filled as f64;
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist(name: &str, contents: &[f64], errors: &[f64]) -> Histogram1D {
        let edges = (0..=contents.len()).map(|i| i as f64).collect();
        Histogram1D::from_parts(name, edges, contents.to_vec(), errors.to_vec()).unwrap()
    }

    #[test]
    fn test_ratio_values_and_errors() {
        let a = hist("a", &[4.0, 0.0, 6.0], &[0.4, 0.0, 0.6]);
        let b = hist("b", &[2.0, 3.0, -1.0], &[0.2, 0.3, 0.1]);
        let r = ratio(&a, &b, "r").unwrap();
        assert_eq!(r.name, "r");
        assert_relative_eq!(r.content(0), 2.0);
        assert_relative_eq!(r.error(0), 2.0 * (0.02f64).sqrt());
        assert_eq!(r.content(1), 0.0);
        assert_eq!(r.content(2), 0.0);
        assert_eq!(r.entries, 1.0);
    }

    #[test]
    fn test_mismatched_binning() {
        let a = hist("a", &[1.0, 1.0], &[0.0, 0.0]);
        let b = hist("b", &[1.0, 1.0, 1.0], &[0.0, 0.0, 0.0]);
        assert!(matches!(ratio(&a, &b, "r"), Err(Error::DimensionMismatch(_))));
    }
}
