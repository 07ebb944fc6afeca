//! Tensor-product interpolation surfaces over 2D sample grids.
//!
//! A [`Surface2d`] is linear along its first axis and a monotone cubic
//! spline along its second. Both table types in the absorber pipeline have
//! that shape: the first axis is log halo mass, the second is a log radius or
//! log threshold along which the tabulated quantity must stay monotone.
//! Interpolation weights along the first axis are non-negative, so any
//! monotone trend along the second axis survives the blend.

use ndarray::Array2;
use thiserror::Error;

use crate::spline::MonotoneSpline;

/// Error types for building interpolants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    /// Sample array does not match the axis lengths
    #[error("data dimensions {found:?} don't match coordinate lengths {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Not enough samples to interpolate
    #[error("need at least 2 samples along each axis, got {0}")]
    InsufficientData(usize),
    /// Axis coordinates are not strictly ascending
    #[error("axis coordinates must be strictly ascending (violated at index {index})")]
    UnsortedAxis { index: usize },
    /// A sample value is NaN or infinite
    #[error("sample at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Interpolated surface on a rectangular grid.
#[derive(Debug, Clone)]
pub struct Surface2d {
    /// First-axis coordinates (ascending)
    x_coords: Vec<f64>,
    /// Second-axis coordinates (ascending)
    y_coords: Vec<f64>,
    /// One spline along the second axis per first-axis node
    rows: Vec<MonotoneSpline>,
}

impl Surface2d {
    /// Build a surface from samples `data[[i, j]] = f(x_coords[i], y_coords[j])`.
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        data: Array2<f64>,
    ) -> Result<Self, InterpolationError> {
        let (nx, ny) = data.dim();
        if nx != x_coords.len() || ny != y_coords.len() {
            return Err(InterpolationError::DimensionMismatch {
                expected: (x_coords.len(), y_coords.len()),
                found: (nx, ny),
            });
        }
        if nx < 2 {
            return Err(InterpolationError::InsufficientData(nx));
        }
        for i in 1..nx {
            if !(x_coords[i] > x_coords[i - 1]) {
                return Err(InterpolationError::UnsortedAxis { index: i });
            }
        }

        let rows = data
            .outer_iter()
            .map(|row| MonotoneSpline::new(y_coords.clone(), row.to_vec()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            x_coords,
            y_coords,
            rows,
        })
    }

    /// Find the bracketing first-axis nodes and the weight of the upper one.
    ///
    /// Coordinates outside the grid are clamped to the nearest edge.
    fn bracket(&self, x: f64) -> (usize, usize, f64) {
        let n = self.x_coords.len();
        if x <= self.x_coords[0] {
            return (0, 1, 0.0);
        }
        if x >= self.x_coords[n - 1] {
            return (n - 2, n - 1, 1.0);
        }

        let mut left = 0;
        let mut right = n - 1;
        while left < right - 1 {
            let mid = (left + right) / 2;
            if x < self.x_coords[mid] {
                right = mid;
            } else {
                left = mid;
            }
        }
        let weight = (x - self.x_coords[left]) / (self.x_coords[right] - self.x_coords[left]);
        (left, right, weight)
    }

    /// Interpolated value at (x, y), clamped to the grid on both axes.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let (low, high, weight) = self.bracket(x);
        (1.0 - weight) * self.rows[low].evaluate(y) + weight * self.rows[high].evaluate(y)
    }

    /// Partial derivative with respect to the second axis at (x, y).
    ///
    /// Zero when y lies outside the grid.
    pub fn derivative_y(&self, x: f64, y: f64) -> f64 {
        let (low, high, weight) = self.bracket(x);
        (1.0 - weight) * self.rows[low].derivative(y) + weight * self.rows[high].derivative(y)
    }

    /// Second-axis bounds.
    pub fn y_range(&self) -> (f64, f64) {
        (self.y_coords[0], self.y_coords[self.y_coords.len() - 1])
    }}
