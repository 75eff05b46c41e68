//! Power-law spectrum: `f(pT) = b pT^(-n)`, defined for `pT > 0`.

use bf_core::{Error, Result};

/// Power-law density at `pt` with exponent `n`.
pub fn pdf(pt: f64, b: f64, n: f64) -> Result<f64> {
    if !n.is_finite() {
        return Err(Error::Validation(format!("n must be finite, got {}", n)));
    }
    if pt <= 0.0 {
        return Ok(0.0);
    }
    Ok(b * pt.powf(-n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_value() {
        assert_relative_eq!(pdf(2.0, 8.0, 3.0).unwrap(), 1.0);
    }

    #[test]
    fn test_non_positive_support() {
        assert_eq!(pdf(0.0, 1.0, 2.0).unwrap(), 0.0);
        assert!(pdf(1.0, 1.0, f64::INFINITY).is_err());
    }
}
