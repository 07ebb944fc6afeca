//! One-dimensional fitted curves over a log abscissa.
//!
//! Curves wrap a [`MonotoneSpline`] and optionally work in log space for the
//! ordinate, which keeps positive, multiplicative quantities (number
//! densities spanning many decades) accurate between nodes.

use serde::{Deserialize, Serialize};

use crate::spline::MonotoneSpline;
use crate::InterpolationError;

/// How the ordinate is stored in the underlying spline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueScale {
    /// Spline through the values themselves
    Linear,
    /// Spline through ln(value); requires every sample to be positive
    Log,
}

impl ValueScale {
    /// Log scale when every sample is strictly positive, linear otherwise.
    pub fn for_samples(values: &[f64]) -> Self {
        if !values.is_empty() && values.iter().all(|&v| v > 0.0) {
            ValueScale::Log
        } else {
            ValueScale::Linear
        }
    }
}

/// Fitted curve y(x) with flat extension outside the sampled range.
#[derive(Debug, Clone)]
pub struct Curve1d {
    spline: MonotoneSpline,
    scale: ValueScale,
}

impl Curve1d {
    /// Fit a curve, choosing the ordinate scale from the samples.
    pub fn fit(x: Vec<f64>, y: Vec<f64>) -> Result<Self, InterpolationError> {
        let scale = ValueScale::for_samples(&y);
        Self::with_scale(x, y, scale)
    }

    /// Fit a curve with an explicit ordinate scale.
    pub fn with_scale(
        x: Vec<f64>,
        y: Vec<f64>,
        scale: ValueScale,
    ) -> Result<Self, InterpolationError> {
        let stored = match scale {
            ValueScale::Linear => y,
            ValueScale::Log => {
                if let Some(index) = y.iter().position(|&v| !(v > 0.0)) {
                    return Err(InterpolationError::NonFinite { index });
                }
                y.into_iter().map(f64::ln).collect()
            }
        };
        Ok(Self {
            spline: MonotoneSpline::new(x, stored)?,
            scale,
        })
    }

    /// Curve value at x, clamped to the sampled range.
    pub fn evaluate(&self, x: f64) -> f64 {
        let stored = self.spline.evaluate(x);
        match self.scale {
            ValueScale::Linear => stored,
            ValueScale::Log => stored.exp(),
        }
    }

    /// Abscissa bounds.
    pub fn range(&self) -> (f64, f64) {
        self.spline.range()
    }

    /// Ordinate scale in use.
    pub fn scale(&self) -> ValueScale {
        self.scale
    }
}
