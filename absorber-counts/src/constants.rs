//! Physical constants and unit conversions (SI unless noted).

use std::f64::consts::PI;

/// Speed of light (m/s)
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;

/// Speed of light (km/s)
pub const SPEED_OF_LIGHT_KMS: f64 = SPEED_OF_LIGHT * 1e-3;

/// Rest frequency of the HI hyperfine transition (Hz)
pub const F21: f64 = 1.420_405_751_768e9;

/// Einstein A coefficient of the 21-cm transition (1/s)
pub const A10: f64 = 2.85e-15;

/// Planck constant (J s)
pub const PLANCK: f64 = 6.626_070_15e-34;

/// Boltzmann constant (J/K)
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Solar mass (kg)
pub const M_SUN: f64 = 1.988_41e30;

/// Proton mass (kg)
pub const M_PROTON: f64 = 1.672_621_923_69e-27;

/// One megaparsec (m)
pub const MPC: f64 = 3.085_677_581_491_367e22;

/// One jansky (W m^-2 Hz^-1)
pub const JANSKY: f64 = 1e-26;

/// Newton's constant in Mpc (km/s)^2 / M_sun
pub const G_MPC_KMS2_PER_MSUN: f64 = 4.300_917_549_715_532e-9;

/// Critical density today in (M_sun/h) / (Mpc/h)^3
pub const RHO_CRIT_0: f64 = 2.775_366_091_982_315e11;

/// Ratio between the 90% velocity width of a Gaussian line and its sigma,
/// `2 sqrt(2) erfinv(0.9)`
pub const W90_PER_SIGMA: f64 = 3.289_707_253_902_946;

/// Converts proper N_HI/T_s (m^-2 K^-1) into frequency-integrated optical
/// depth (Hz): `3 c^2 h A10 / (32 pi k_B nu_21)`
pub const NHI_OVER_TS_TO_TAU: f64 =
    3.0 * SPEED_OF_LIGHT * SPEED_OF_LIGHT * PLANCK * A10 / (32.0 * PI * BOLTZMANN * F21);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_optical_depth_conversion() {
        assert_relative_eq!(NHI_OVER_TS_TO_TAU, 2.5827e-19, max_relative = 1e-4);
    }

    #[test]
    fn test_line_width_ratio() {
        // erfinv(0.9) = 1.16308715...
        assert_relative_eq!(W90_PER_SIGMA / (2.0 * 2f64.sqrt()), 1.163_087_153_676_674, epsilon = 1e-12);
    }
}
