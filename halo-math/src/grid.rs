//! Log-spaced sample axes for interpolation tables.
//!
//! Every table in the absorber pipeline is sampled on a fixed number of
//! points evenly spaced in log10 of the physical variable between configured
//! bounds. [`LogAxis`] holds those three numbers and hands out the node
//! values in the forms the table builders need.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounds or resolution that cannot describe an axis.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AxisError {
    #[error("axis bounds must be finite with log10_min < log10_max, got [{log10_min}, {log10_max}]")]
    InvalidBounds { log10_min: f64, log10_max: f64 },

    #[error("an axis needs at least 2 points, got {0}")]
    TooFewPoints(usize),
}

/// Axis fields as written in configuration, before checking.
#[derive(Deserialize)]
struct AxisFields {
    log10_min: f64,
    log10_max: f64,
    points: usize,
}

impl TryFrom<AxisFields> for LogAxis {
    type Error = AxisError;

    fn try_from(fields: AxisFields) -> Result<Self, AxisError> {
        LogAxis::try_new(fields.log10_min, fields.log10_max, fields.points)
    }
}

/// Evenly spaced nodes in log10 between `log10_min` and `log10_max` inclusive.
///
/// Deserializing checks the same conditions as [`LogAxis::try_new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisFields")]
pub struct LogAxis {
    /// log10 of the smallest node
    pub log10_min: f64,
    /// log10 of the largest node
    pub log10_max: f64,
    /// Number of nodes (at least 2)
    pub points: usize,
}

impl LogAxis {
    /// Create an axis.
    ///
    /// # Panics
    ///
    /// Panics if `log10_min >= log10_max` or `points < 2`.
    pub fn new(log10_min: f64, log10_max: f64, points: usize) -> Self {
        assert!(log10_min < log10_max, "log10_min must be less than log10_max");
        assert!(points >= 2, "Need at least 2 points for an axis");
        Self {
            log10_min,
            log10_max,
            points,
        }
    }

    /// Create an axis, rejecting empty or non-finite ranges and fewer than
    /// two points.
    pub fn try_new(log10_min: f64, log10_max: f64, points: usize) -> Result<Self, AxisError> {
        let axis = Self {
            log10_min,
            log10_max,
            points,
        };
        axis.validate()?;
        Ok(axis)
    }

    /// Check the fields of an axis built by struct literal.
    pub fn validate(&self) -> Result<(), AxisError> {
        if !(self.log10_min.is_finite()
            && self.log10_max.is_finite()
            && self.log10_min < self.log10_max)
        {
            return Err(AxisError::InvalidBounds {
                log10_min: self.log10_min,
                log10_max: self.log10_max,
            });
        }
        if self.points < 2 {
            return Err(AxisError::TooFewPoints(self.points));
        }
        Ok(())
    }

    /// Spacing between nodes in log10.
    pub fn step(&self) -> f64 {
        (self.log10_max - self.log10_min) / (self.points - 1) as f64
    }

    /// Node positions in log10.
    pub fn log10_nodes(&self) -> Vec<f64> {
        let step = self.step();
        (0..self.points)
            .map(|i| {
                if i == self.points - 1 {
                    self.log10_max
                } else {
                    self.log10_min + i as f64 * step
                }
            })
            .collect()
    }

    /// Node positions in natural log.
    pub fn ln_nodes(&self) -> Vec<f64> {
        self.log10_nodes()
            .into_iter()
            .map(|v| v * std::f64::consts::LN_10)
            .collect()
    }

    /// Node positions as physical values.
    pub fn nodes(&self) -> Vec<f64> {
        self.log10_nodes()
            .into_iter()
            .map(|v| 10f64.powf(v))
            .collect()
    }

    /// Smallest node as a physical value.
    pub fn min(&self) -> f64 {
        10f64.powf(self.log10_min)
    }

    /// Largest node as a physical value.
    pub fn max(&self) -> f64 {
        10f64.powf(self.log10_max)
    }

    /// Whether a physical value lies within the axis bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min() && value <= self.max()
    }
}

/// `n` values evenly spaced in log10 between `10^start` and `10^stop`.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    LogAxis::new(start, stop, n).nodes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nodes_span_bounds() {
        let axis = LogAxis::new(-3.0, 0.0, 4);
        let nodes = axis.nodes();

        assert_eq!(nodes.len(), 4);
        assert_relative_eq!(nodes[0], 1e-3, max_relative = 1e-12);
        assert_relative_eq!(nodes[1], 1e-2, max_relative = 1e-12);
        assert_eq!(nodes[3], 1.0);
        assert_relative_eq!(axis.step(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ln_nodes() {
        let axis = LogAxis::new(0.0, 2.0, 3);
        let ln = axis.ln_nodes();
        assert_relative_eq!(ln[1], 10f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(ln[2], 100f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_contains() {
        let axis = LogAxis::new(0.0, 2.0, 5);
        assert!(axis.contains(1.0));
        assert!(axis.contains(50.0));
        assert!(!axis.contains(0.5));
        assert!(!axis.contains(200.0));
    }

    #[test]
    fn test_logspace() {
        let values = logspace(1.0, 3.0, 3);
        assert_relative_eq!(values[0], 10.0, max_relative = 1e-12);
        assert_relative_eq!(values[2], 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_try_new_rejects_bad_axes() {
        assert!(LogAxis::try_new(-1.0, 1.0, 2).is_ok());
        assert!(matches!(
            LogAxis::try_new(1.0, 1.0, 10),
            Err(AxisError::InvalidBounds { .. })
        ));
        assert!(matches!(
            LogAxis::try_new(f64::NAN, 1.0, 10),
            Err(AxisError::InvalidBounds { .. })
        ));
        assert_eq!(LogAxis::try_new(0.0, 1.0, 0), Err(AxisError::TooFewPoints(0)));
    }

    #[test]
    fn test_deserialize_checks_fields() {
        let axis: LogAxis =
            serde_json::from_str(r#"{"log10_min": -2.0, "log10_max": 1.0, "points": 4}"#).unwrap();
        assert_eq!(axis, LogAxis::new(-2.0, 1.0, 4));

        let empty = serde_json::from_str::<LogAxis>(
            r#"{"log10_min": -2.0, "log10_max": 1.0, "points": 0}"#,
        );
        assert!(empty.unwrap_err().to_string().contains("at least 2 points"));

        let inverted = serde_json::from_str::<LogAxis>(
            r#"{"log10_min": 3.0, "log10_max": 1.0, "points": 8}"#,
        );
        assert!(inverted.is_err());
    }

    #[test]
    #[should_panic(expected = "log10_min must be less than log10_max")]
    fn test_inverted_bounds() {
        LogAxis::new(2.0, 1.0, 10);
    }
}
