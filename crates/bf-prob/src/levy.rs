//! Levy transverse-momentum spectrum.
//!
//! `f(pT) = 2π b pT / (1 + (mT - m) / (n t))^n` with `mT = sqrt(pT² + m²)`.

use bf_core::{Error, Result};

use crate::check_shape;

/// Levy density at `pt` with normalization `b`, particle mass `m`, power `n`
/// and slope `t`.
pub fn pdf(pt: f64, b: f64, m: f64, n: f64, t: f64) -> Result<f64> {
    check_shape("n", n)?;
    check_shape("t", t)?;
    if !m.is_finite() || m < 0.0 {
        return Err(Error::Validation(format!("mass must be finite and >= 0, got {}", m)));
    }
    if pt < 0.0 {
        return Ok(0.0);
    }
    let mt = (pt * pt + m * m).sqrt();
    let arg = 1.0 + (mt - m) / (n * t);
    Ok(std::f64::consts::TAU * b * pt / arg.powf(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_value() {
        let m: f64 = 0.14;
        let pt: f64 = 5.0;
        let mt = (pt * pt + m * m).sqrt();
        let expected = std::f64::consts::TAU * 2.0 * pt / (1.0 + (mt - m) / (6.0 * 0.5)).powf(6.0);
        assert_relative_eq!(pdf(pt, 2.0, m, 6.0, 0.5).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_vanishes_at_zero_and_below() {
        assert_eq!(pdf(0.0, 1.0, 0.14, 5.0, 1.0).unwrap(), 0.0);
        assert_eq!(pdf(-1.0, 1.0, 0.14, 5.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_shape() {
        assert!(pdf(1.0, 1.0, 0.14, 0.0, 1.0).is_err());
        assert!(pdf(1.0, 1.0, 0.14, 5.0, -1.0).is_err());
        assert!(pdf(1.0, 1.0, -0.1, 5.0, 1.0).is_err());
    }
}
