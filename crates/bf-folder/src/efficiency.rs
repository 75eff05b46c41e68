//! Efficiency curve preparation: plateau smoothing and error removal.

use bf_core::{Error, Result};
use bf_hist::Histogram1D;
use serde::{Deserialize, Serialize};

/// Constant fit over a plateau window, applied above a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateauSmoothing {
    /// Lower end of the fit window (GeV/c).
    pub fit_low: f64,
    /// Upper end of the fit window (GeV/c).
    pub fit_high: f64,
    /// Bins with a low edge at or above this are replaced by the fit.
    pub threshold: f64,
}

impl Default for PlateauSmoothing {
    fn default() -> Self {
        Self { fit_low: 10.0, fit_high: 20.0, threshold: 20.0 }
    }
}

/// Options applied when an efficiency curve is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyOptions {
    /// High-range smoothing, if any.
    pub smoothing: Option<PlateauSmoothing>,
    /// Drop all bin errors.
    pub zero_errors: bool,
}

/// Result of a plateau fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauFit {
    /// Fitted constant.
    pub value: f64,
    /// Uncertainty of the constant.
    pub error: f64,
    /// Number of bins in the fit.
    pub n_bins: usize,
}

/// Weighted constant fit over bins whose centre lies in the window.
pub fn fit_plateau(h: &Histogram1D, lo: f64, hi: f64) -> Result<PlateauFit> {
    let bins: Vec<usize> = (0..h.n_bins())
        .filter(|&i| {
            let x = h.center(i);
            x >= lo && x <= hi && h.content(i) > 0.0
        })
        .collect();
    if bins.is_empty() {
        return Err(Error::Validation(format!(
            "efficiency '{}' has no populated bins in [{}, {}]",
            h.name, lo, hi
        )));
    }
    let weighted = bins.iter().all(|&i| h.error(i) > 0.0);
    if weighted {
        let (sw, swy) = bins.iter().fold((0.0, 0.0), |(sw, swy), &i| {
            let w = 1.0 / h.error(i).powi(2);
            (sw + w, swy + w * h.content(i))
        });
        Ok(PlateauFit { value: swy / sw, error: (1.0 / sw).sqrt(), n_bins: bins.len() })
    } else {
        let mean = bins.iter().map(|&i| h.content(i)).sum::<f64>() / bins.len() as f64;
        Ok(PlateauFit { value: mean, error: 0.0, n_bins: bins.len() })
    }
}

/// Overwrite bins at or above the threshold with the plateau value, keeping
/// each bin's relative error (the fit's own relative error for empty bins).
pub fn smooth_plateau(h: &mut Histogram1D, s: &PlateauSmoothing) -> Result<PlateauFit> {
    let fit = fit_plateau(h, s.fit_low, s.fit_high)?;
    let fit_rel = fit.error / fit.value;
    let mut replaced = 0usize;
    for i in 0..h.n_bins() {
        if h.low_edge(i) < s.threshold {
            continue;
        }
        let c = h.content(i);
        let rel = if c > 0.0 { h.error(i) / c } else { fit_rel };
        h.set_content(i, fit.value);
        h.set_error(i, fit.value * rel);
        replaced += 1;
    }
    tracing::debug!(
        name = %h.name,
        value = fit.value,
        error = fit.error,
        replaced,
        "efficiency plateau smoothing"
    );
    Ok(fit)
}

/// Apply `opts` to a freshly loaded efficiency curve.
pub fn prepare(h: &mut Histogram1D, opts: &EfficiencyOptions) -> Result<()> {
    if let Some(s) = &opts.smoothing {
        smooth_plateau(h, s)?;
    }
    if opts.zero_errors {
        h.clear_errors();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn curve() -> Histogram1D {
        // 5 GeV bins from 0 to 40.
        let edges = (0..=8).map(|i| i as f64 * 5.0).collect();
        let contents = vec![0.2, 0.5, 0.78, 0.82, 0.9, 0.6, 0.0, 0.7];
        let errors = vec![0.02, 0.05, 0.02, 0.02, 0.09, 0.12, 0.0, 0.35];
        Histogram1D::from_parts("eff", edges, contents, errors).unwrap()
    }

    #[test]
    fn test_weighted_fit() {
        let h = curve();
        // centres 12.5 and 17.5
        let fit = fit_plateau(&h, 10.0, 20.0).unwrap();
        assert_eq!(fit.n_bins, 2);
        assert_relative_eq!(fit.value, 0.8, max_relative = 1e-12);
        assert_relative_eq!(fit.error, (1.0f64 / 5000.0).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn test_smoothing_above_threshold() {
        let mut h = curve();
        let fit = smooth_plateau(&mut h, &PlateauSmoothing::default()).unwrap();
        // below threshold untouched
        assert_eq!(h.content(3), 0.82);
        for i in 4..8 {
            assert_relative_eq!(h.content(i), 0.8, max_relative = 1e-12);
        }
        // relative errors kept: 0.09/0.9 = 10 %, 0.12/0.6 = 20 %, 0.35/0.7 = 50 %
        assert_relative_eq!(h.error(4), 0.08, max_relative = 1e-9);
        assert_relative_eq!(h.error(5), 0.16, max_relative = 1e-9);
        assert_relative_eq!(h.error(7), 0.40, max_relative = 1e-9);
        // empty bin takes the fit's relative error
        assert_relative_eq!(h.error(6), fit.error, max_relative = 1e-9);
    }

    #[test]
    fn test_prepare_zero_errors() {
        let mut h = curve();
        prepare(&mut h, &EfficiencyOptions { smoothing: None, zero_errors: true }).unwrap();
        assert!(h.errors().iter().all(|e| *e == 0.0));
        assert_eq!(h.content(0), 0.2);
    }

    #[test]
    fn test_empty_window_is_an_error() {
        let mut h = curve();
        let s = PlateauSmoothing { fit_low: 100.0, fit_high: 200.0, threshold: 150.0 };
        assert!(smooth_plateau(&mut h, &s).is_err());
    }
}
