//! Reduced chi-square between two binned distributions over their common
//! non-empty range.

use bf_core::Chi2Score;
use bf_hist::Histogram1D;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Compare `comparison` against `reference`.
///
/// The range is the intersection of `[first, last]` bins above zero of both
/// histograms. Within it each reference bin is matched to the comparison bin
/// at the same centre; bins with negative content are skipped, and a bin
/// contributes only when its combined error is positive. Errors are
/// symmetric.
pub fn chi2(reference: &Histogram1D, comparison: &Histogram1D) -> Chi2Score {
    let bounds = (
        reference.first_bin_above(0.0),
        reference.last_bin_above(0.0),
        comparison.first_bin_above(0.0),
        comparison.last_bin_above(0.0),
    );
    let (Some(a_min), Some(a_max), Some(b_min), Some(b_max)) = bounds else {
        return Chi2Score::empty();
    };
    let i_min = a_min.max(b_min);
    let i_max = a_max.min(b_max);
    if i_min > i_max {
        return Chi2Score::empty();
    }
    let x_min = reference.center(i_min);
    let x_max = reference.center(i_max);

    let mut sum = 0.0;
    let mut n_bins = 0usize;
    for i in 0..reference.n_bins() {
        let x = reference.center(i);
        if x < x_min || x > x_max {
            continue;
        }
        let Some(j) = comparison.find_bin(x) else { continue };
        let (y_ref, y_cmp) = (reference.content(i), comparison.content(j));
        if y_ref < 0.0 || y_cmp < 0.0 {
            continue;
        }
        let var = reference.error(i).powi(2) + comparison.error(j).powi(2);
        if var > 0.0 {
            sum += (y_ref - y_cmp).powi(2) / var;
            n_bins += 1;
        }
    }

    if n_bins == 0 {
        return Chi2Score::empty();
    }
    let p_value = ChiSquared::new(n_bins as f64).ok().map(|d| d.sf(sum));
    Chi2Score { sum, n_bins, reduced: sum / n_bins as f64, p_value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist(contents: &[f64]) -> Histogram1D {
        let n = contents.len();
        let edges = (0..=n).map(|i| i as f64).collect();
        let errors = contents.iter().map(|c| c.abs().sqrt()).collect();
        Histogram1D::from_parts("h", edges, contents.to_vec(), errors).unwrap()
    }

    #[test]
    fn test_self_comparison_is_zero() {
        let a = hist(&[0.0, 4.0, 9.0, 16.0, 0.0]);
        let s = chi2(&a, &a.clone());
        assert!(s.is_defined());
        assert_eq!(s.n_bins, 3);
        assert_eq!(s.reduced, 0.0);
        assert_relative_eq!(s.p_value.unwrap(), 1.0);
    }

    #[test]
    fn test_disjoint_support_is_undefined() {
        let mut a = vec![0.0; 20];
        let mut b = vec![0.0; 20];
        a[1..=5].iter_mut().for_each(|v| *v = 10.0);
        b[10..=15].iter_mut().for_each(|v| *v = 10.0);
        let s = chi2(&hist(&a), &hist(&b));
        assert!(!s.is_defined());
        assert_eq!(s.n_bins, 0);
        assert_eq!(s.reduced, 0.0);
        assert!(s.p_value.is_none());
    }

    #[test]
    fn test_known_value() {
        // bins: (4 vs 1) and (9 vs 4): errors² 4+1 and 9+4.
        let a = hist(&[4.0, 9.0]);
        let b = hist(&[1.0, 4.0]);
        let s = chi2(&a, &b);
        let expected = 9.0 / 5.0 + 25.0 / 13.0;
        assert_relative_eq!(s.sum, expected);
        assert_eq!(s.n_bins, 2);
        assert_relative_eq!(s.reduced, expected / 2.0);
    }

    #[test]
    fn test_negative_and_zero_error_bins_skipped() {
        let a = Histogram1D::from_parts("a", vec![0.0, 1.0, 2.0, 3.0], vec![1.0, -2.0, 5.0], vec![1.0, 1.0, 0.0])
            .unwrap();
        let b = Histogram1D::from_parts("b", vec![0.0, 1.0, 2.0, 3.0], vec![2.0, 2.0, 5.0], vec![0.0, 1.0, 0.0])
            .unwrap();
        let s = chi2(&a, &b);
        // bin 0 contributes (1/1), bin 1 negative, bin 2 has no error.
        assert_eq!(s.n_bins, 1);
        assert_relative_eq!(s.reduced, 1.0);
    }

    #[test]
    fn test_range_is_intersection() {
        let a = hist(&[5.0, 5.0, 5.0, 5.0]);
        let b = hist(&[0.0, 5.0, 5.0, 0.0]);
        assert_eq!(chi2(&a, &b).n_bins, 2);
    }
}
