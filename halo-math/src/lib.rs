//! halo-math - Numerical building blocks for halo-model forecasts
//!
//! This crate provides the interpolation and integration machinery used by
//! the absorber-count pipeline, independent of any physics:
//!
//! - **Grid** - log-spaced sample axes
//! - **Spline** - monotone (shape-preserving) cubic Hermite interpolation
//! - **Curve** - 1D fitted curves with optional log-scaled ordinate
//! - **Surface** - 2D tables, linear in the first axis and monotone cubic in the second
//! - **Interp** - piecewise-linear lookup on sorted samples
//! - **Quadrature** - adaptive Gauss–Kronrod integration with fallible integrands
//!
//! # Example
//!
//! ```
//! use halo_math::{Curve1d, LogAxis};
//!
//! let axis = LogAxis::new(0.0, 3.0, 16);
//! let values: Vec<f64> = axis.nodes().iter().map(|x| 1.0 / x).collect();
//! let curve = Curve1d::fit(axis.ln_nodes(), values).unwrap();
//! assert!((curve.evaluate(50f64.ln()) - 0.02).abs() < 1e-10);
//! ```

pub mod curve;
pub mod grid;
pub mod interp;
pub mod quadrature;
pub mod spline;
pub mod surface;

// Re-export commonly used types
pub use curve::{Curve1d, ValueScale};
pub use grid::{logspace, AxisError, LogAxis};
pub use interp::{interp, InterpError};
pub use quadrature::{integrate, integrate_piecewise, QuadratureConfig, QuadratureError};
pub use spline::MonotoneSpline;
pub use surface::{InterpolationError, Surface2d};
