//! Adaptive Gauss–Kronrod quadrature.
//!
//! Integrals are estimated with the 7-point Gauss / 15-point Kronrod pair on
//! each subinterval. The subinterval with the largest error estimate is
//! bisected until the summed error drops below
//! `max(abs_tolerance, rel_tolerance * |integral|)` or the interval budget is
//! spent, in which case the caller gets [`QuadratureError::NonConvergence`]
//! rather than a silently degraded answer.
//!
//! Integrands are fallible: an integrand that itself consults lazily built
//! tables can fail, and that failure is returned unchanged.
//!
//! # Example
//!
//! ```
//! use halo_math::quadrature::{integrate, QuadratureConfig, QuadratureError};
//!
//! let config = QuadratureConfig::default();
//! let area = integrate(|x: f64| Ok::<_, QuadratureError>(x.sin()), 0.0, std::f64::consts::PI, &config)
//!     .unwrap();
//! assert!((area - 2.0).abs() < 1e-10);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;

/// Kronrod abscissae on [-1, 1] (positive half, descending; last is the centre)
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

/// Kronrod weights matching `XGK`
const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

/// Gauss weights for the odd-indexed Kronrod abscissae (1, 3, 5) and the centre
const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// Errors raised by the quadrature routines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadratureError {
    /// The interval budget was exhausted before reaching the tolerance
    #[error(
        "quadrature on [{lower}, {upper}] did not converge: estimate {estimate:e}, error {error:e} after {intervals} intervals"
    )]
    NonConvergence {
        lower: f64,
        upper: f64,
        estimate: f64,
        error: f64,
        intervals: usize,
    },
    /// The integrand produced NaN or infinity
    #[error("integrand is not finite at x = {x}: {value}")]
    NonFinite { x: f64, value: f64 },
}

/// Tolerances and budget for adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadratureConfig {
    /// Absolute error target
    pub abs_tolerance: f64,
    /// Relative error target
    pub rel_tolerance: f64,
    /// Maximum number of subintervals per integral
    pub max_intervals: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: 0.0,
            rel_tolerance: 1e-8,
            max_intervals: 1000,
        }
    }
}

/// One subinterval with its Kronrod estimate and error, ordered by error.
#[derive(Debug, Clone, Copy)]
struct Segment {
    lower: f64,
    upper: f64,
    estimate: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.error.total_cmp(&other.error) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

fn checked<E>(x: f64, value: f64) -> Result<f64, E>
where
    E: From<QuadratureError>,
{
    if value.is_finite() {
        Ok(value)
    } else {
        Err(QuadratureError::NonFinite { x, value }.into())
    }
}

/// Apply the 7/15-point Gauss–Kronrod rule on [lower, upper].
fn kronrod_segment<F, E>(f: &mut F, lower: f64, upper: f64) -> Result<Segment, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<QuadratureError>,
{
    let center = 0.5 * (lower + upper);
    let half = 0.5 * (upper - lower);

    let fc = checked(center, f(center)?)?;
    let mut kronrod = fc * WGK[7];
    let mut gauss = fc * WG[3];

    for j in 0..7 {
        let dx = half * XGK[j];
        let (x1, x2) = (center - dx, center + dx);
        let f1 = checked(x1, f(x1)?)?;
        let f2 = checked(x2, f(x2)?)?;
        kronrod += WGK[j] * (f1 + f2);
        if j % 2 == 1 {
            gauss += WG[j / 2] * (f1 + f2);
        }
    }

    Ok(Segment {
        lower,
        upper,
        estimate: kronrod * half,
        error: ((kronrod - gauss) * half).abs(),
    })
}

/// Integrate `f` over [lower, upper] adaptively.
///
/// Reversed bounds return the negated integral; equal bounds return zero.
pub fn integrate<F, E>(mut f: F, lower: f64, upper: f64, config: &QuadratureConfig) -> Result<f64, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<QuadratureError>,
{
    if lower == upper {
        return Ok(0.0);
    }
    if lower > upper {
        return integrate(f, upper, lower, config).map(|v: f64| -v);
    }

    let first = kronrod_segment(&mut f, lower, upper)?;
    let mut total = first.estimate;
    let mut total_error = first.error;
    let mut heap = BinaryHeap::new();
    heap.push(first);

    loop {
        let tolerance = config.abs_tolerance.max(config.rel_tolerance * total.abs());
        if total_error <= tolerance {
            return Ok(total);
        }
        if heap.len() >= config.max_intervals {
            break;
        }
        let Some(worst) = heap.pop() else {
            break;
        };
        let mid = 0.5 * (worst.lower + worst.upper);
        if !(mid > worst.lower && mid < worst.upper) {
            // Interval can no longer be split in floating point
            heap.push(worst);
            break;
        }

        let left = kronrod_segment(&mut f, worst.lower, mid)?;
        let right = kronrod_segment(&mut f, mid, worst.upper)?;
        total += left.estimate + right.estimate - worst.estimate;
        total_error += left.error + right.error - worst.error;
        heap.push(left);
        heap.push(right);
    }

    // Re-sum to shed accumulated cancellation before judging the final state
    let total: f64 = heap.iter().map(|s| s.estimate).sum();
    let total_error: f64 = heap.iter().map(|s| s.error).sum();
    if total_error <= config.abs_tolerance.max(config.rel_tolerance * total.abs()) {
        return Ok(total);
    }
    Err(QuadratureError::NonConvergence {
        lower,
        upper,
        estimate: total,
        error: total_error,
        intervals: heap.len(),
    }
    .into())
}

/// Integrate over consecutive breakpoints, summing the per-piece integrals.
///
/// Breaking at known kinks of the integrand (table nodes, for example) lets
/// each piece converge on a smooth function.
pub fn integrate_piecewise<F, E>(
    mut f: F,
    breakpoints: &[f64],
    config: &QuadratureConfig,
) -> Result<f64, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<QuadratureError>,
{
    let mut sum = 0.0;
    for pair in breakpoints.windows(2) {
        sum += integrate(&mut f, pair[0], pair[1], config)?;
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn ok(v: f64) -> Result<f64, QuadratureError> {
        Ok(v)
    }

    #[test]
    fn test_polynomial_exact() {
        let config = QuadratureConfig::default();
        let value = integrate(|x| ok(3.0 * x * x + 2.0 * x + 1.0), 0.0, 2.0, &config).unwrap();
        assert_relative_eq!(value, 8.0 + 4.0 + 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reversed_and_empty_bounds() {
        let config = QuadratureConfig::default();
        let forward = integrate(|x| ok(x.exp()), 0.0, 1.0, &config).unwrap();
        let backward = integrate(|x| ok(x.exp()), 1.0, 0.0, &config).unwrap();
        assert_relative_eq!(forward, -backward, epsilon = 1e-14);
        assert_eq!(integrate(|x| ok(x), 3.0, 3.0, &config).unwrap(), 0.0);
    }

    #[test]
    fn test_kink_converges() {
        let config = QuadratureConfig::default();
        let value = integrate(|x: f64| ok(x.abs()), -1.0, 2.0, &config).unwrap();
        assert_relative_eq!(value, 0.5 + 2.0, max_relative = 1e-8);
    }

    #[test]
    fn test_oscillatory() {
        let config = QuadratureConfig::default();
        let value = integrate(|x: f64| ok((10.0 * x).sin().powi(2)), 0.0, PI, &config).unwrap();
        assert_relative_eq!(value, PI / 2.0, max_relative = 1e-8);
    }

    #[test]
    fn test_zero_integrand() {
        let config = QuadratureConfig::default();
        assert_eq!(integrate(|_| ok(0.0), 0.0, 5.0, &config).unwrap(), 0.0);
    }

    #[test]
    fn test_piecewise_matches_single() {
        let config = QuadratureConfig::default();
        let whole = integrate(|x: f64| ok(x.cos()), 0.0, 3.0, &config).unwrap();
        let pieces = integrate_piecewise(|x: f64| ok(x.cos()), &[0.0, 0.5, 1.7, 3.0], &config).unwrap();
        assert_relative_eq!(whole, pieces, epsilon = 1e-12);
        assert_relative_eq!(whole, 3f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_non_convergence_reported() {
        let config = QuadratureConfig {
            abs_tolerance: 0.0,
            rel_tolerance: 1e-14,
            max_intervals: 2,
        };
        let result = integrate(|x: f64| ok(1.0 / x.sqrt()), 1e-12, 1.0, &config);
        assert!(matches!(
            result,
            Err(QuadratureError::NonConvergence { .. })
        ));
    }

    #[test]
    fn test_non_finite_integrand() {
        let config = QuadratureConfig::default();
        let result = integrate(|_| ok(f64::NAN), 0.0, 1.0, &config);
        assert!(matches!(result, Err(QuadratureError::NonFinite { .. })));
    }

    #[test]
    fn test_integrand_error_propagates() {
        #[derive(Debug)]
        enum Failure {
            Integrand,
            Quadrature,
        }
        impl From<QuadratureError> for Failure {
            fn from(_: QuadratureError) -> Self {
                Failure::Quadrature
            }
        }

        let config = QuadratureConfig::default();
        let result: Result<f64, Failure> =
            integrate(|x| if x > 0.5 { Err(Failure::Integrand) } else { Ok(x) }, 0.0, 1.0, &config);
        assert!(matches!(result, Err(Failure::Integrand)));
    }
}
