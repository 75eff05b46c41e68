//! Exponential spectrum: `f(pT) = b exp(-pT / t)`.

use bf_core::Result;

use crate::check_shape;

/// Exponential density at `pt` with slope `t`.
pub fn pdf(pt: f64, b: f64, t: f64) -> Result<f64> {
    check_shape("t", t)?;
    Ok(b * (-pt / t).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_value() {
        assert_relative_eq!(pdf(2.0, 4.0, 2.0).unwrap(), 4.0 * (-1.0f64).exp());
    }

    #[test]
    fn test_invalid_slope() {
        assert!(pdf(1.0, 1.0, 0.0).is_err());
        assert!(pdf(1.0, 1.0, f64::NAN).is_err());
    }
}
