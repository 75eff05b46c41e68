//! Tsallis spectrum: `f(pT) = b pT (1 + pT / (n t))^(-n)`.

use bf_core::Result;

use crate::check_shape;

/// Tsallis density at `pt`.
pub fn pdf(pt: f64, b: f64, n: f64, t: f64) -> Result<f64> {
    check_shape("n", n)?;
    check_shape("t", t)?;
    if pt < 0.0 {
        return Ok(0.0);
    }
    Ok(b * pt * (1.0 + pt / (n * t)).powf(-n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_value() {
        let v = pdf(2.0, 3.0, 4.0, 0.5).unwrap();
        assert_relative_eq!(v, 3.0 * 2.0 * 2.0f64.powf(-4.0), max_relative = 1e-12);
    }

    #[test]
    fn test_large_n_approaches_exponential_times_pt() {
        let t = 1.5;
        let pt = 3.0;
        let v = pdf(pt, 1.0, 1.0e6, t).unwrap();
        assert_relative_eq!(v, pt * (-pt / t).exp(), max_relative = 1e-4);
    }
}
