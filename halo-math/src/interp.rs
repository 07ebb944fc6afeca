//! Piecewise-linear interpolation on sorted samples.

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

/// Performs linear interpolation on 1D data using binary search.
///
/// # Arguments
///
/// * `x` - The x-coordinate at which to interpolate
/// * `xs` - x-coordinates, strictly ascending
/// * `ys` - corresponding y-values
///
/// # Errors
///
/// * `InterpError::OutOfBounds` - x is outside \\[xs\\[0\\], xs\\[n-1\\]\\]
/// * `InterpError::InsufficientData` - fewer than 2 points
/// * `InterpError::MismatchedLengths` - xs and ys differ in length
/// * `InterpError::UnsortedData` - xs is not strictly ascending
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(InterpError::UnsortedData);
        }
    }

    let min_x = xs[0];
    let max_x = xs[xs.len() - 1];
    if !(x >= min_x && x <= max_x) {
        return Err(InterpError::OutOfBounds(x, min_x, max_x));
    }

    // First index with xs[idx] >= x
    let idx = xs.partition_point(|&node| node < x);
    if xs[idx] == x {
        return Ok(ys[idx]);
    }

    let (x1, x2) = (xs[idx - 1], xs[idx]);
    let (y1, y2) = (ys[idx - 1], ys[idx]);
    let t = (x - x1) / (x2 - x1);
    Ok(y1 + t * (y2 - y1))
}
