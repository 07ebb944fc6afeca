//! Error types for the absorber pipeline.

use halo_math::{InterpError, InterpolationError, QuadratureError};
use thiserror::Error;

/// Errors raised while evaluating absorber statistics.
///
/// Queries that fall outside a table's grid are not errors; each operation
/// documents how it clamps or zeroes them.
#[derive(Debug, Error)]
pub enum AbsorberError {
    /// A physical input is outside its domain (negative mass, redshift, ...)
    #[error("invalid {name} = {value}: {reason}")]
    InvalidDomainInput {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A configuration entry has the wrong type or an unphysical value
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// `profile_model` names a family that is not registered
    #[error("unknown profile model '{name}' (known: {known:?})")]
    UnknownProfileModel { name: String, known: Vec<String> },

    /// Adaptive quadrature failed to reach its tolerance
    #[error("numerical non-convergence: {0}")]
    NonConvergence(#[from] QuadratureError),

    /// The line-centre optical depth grows outward, so it cannot be inverted
    #[error("optical depth is not monotone in radius for m = {mass:e}, z = {redshift}")]
    NonMonotonicProfile { mass: f64, redshift: f64 },

    /// A table could not be fitted
    #[error("table construction failed: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Row inversion failed
    #[error("profile inversion failed: {0}")]
    Inversion(#[from] InterpError),

    /// Output array could not take the input's shape
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Parameter set could not be parsed
    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl AbsorberError {
    /// Whether this error reports malformed input rather than a numerical failure.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            AbsorberError::InvalidDomainInput { .. }
                | AbsorberError::InvalidParameter { .. }
                | AbsorberError::UnknownProfileModel { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AbsorberError>;

/// Fail unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AbsorberError::InvalidDomainInput {
            name,
            value,
            reason: "must be finite and positive",
        })
    }
}

/// Fail unless `value` is finite and not negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AbsorberError::InvalidDomainInput {
            name,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_guard() {
        assert_eq!(ensure_positive("mass", 1e12).unwrap(), 1e12);
        assert!(ensure_positive("mass", 0.0).is_err());
        assert!(ensure_positive("mass", f64::NAN).is_err());
        assert!(ensure_non_negative("redshift", 0.0).is_ok());
        assert!(ensure_non_negative("redshift", -0.1).unwrap_err().is_domain_error());
    }

    #[test]
    fn test_quadrature_error_is_not_domain_error() {
        let err: AbsorberError = QuadratureError::NonFinite {
            x: 0.0,
            value: f64::NAN,
        }
        .into();
        assert!(!err.is_domain_error());
        assert!(err.to_string().contains("non-convergence"));
    }
}
