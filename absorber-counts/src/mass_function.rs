//! Halo mass functions.

use serde::{Deserialize, Serialize};

/// Comoving number density of halos per unit log10 mass, in (h/Mpc)^3.
///
/// Any `Fn(m, z) -> f64` closure that is `Send + Sync` is a mass function.
pub trait MassFunction: Send + Sync {
    fn dn_dlog10m(&self, m: f64, z: f64) -> f64;
}

impl<F> MassFunction for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn dn_dlog10m(&self, m: f64, z: f64) -> f64 {
        self(m, z)
    }
}

/// Power law in mass with an exponential high-mass cutoff:
/// `amplitude * (m / pivot_mass)^slope * exp(-m / cutoff_mass)`.
///
/// Redshift independent; adequate for forecasts at a single epoch and for
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawMassFunction {
    /// Density per log10 mass at the pivot, before the cutoff, in (h/Mpc)^3
    pub amplitude: f64,
    /// Pivot mass in M_sun/h
    pub pivot_mass: f64,
    pub slope: f64,
    /// Cutoff mass in M_sun/h; infinite for a pure power law
    pub cutoff_mass: f64,
}

impl Default for PowerLawMassFunction {
    fn default() -> Self {
        Self {
            amplitude: 3e-3,
            pivot_mass: 1e12,
            slope: -0.9,
            cutoff_mass: 1e14,
        }
    }
}

impl PowerLawMassFunction {
    /// Pure power law without a cutoff.
    pub fn power_law(amplitude: f64, pivot_mass: f64, slope: f64) -> Self {
        Self {
            amplitude,
            pivot_mass,
            slope,
            cutoff_mass: f64::INFINITY,
        }
    }
}

impl MassFunction for PowerLawMassFunction {
    fn dn_dlog10m(&self, m: f64, _z: f64) -> f64 {
        self.amplitude * (m / self.pivot_mass).powf(self.slope) * (-m / self.cutoff_mass).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_law() {
        let mf = PowerLawMassFunction::power_law(1e-2, 1e12, -1.0);
        assert_relative_eq!(mf.dn_dlog10m(1e12, 0.0), 1e-2, epsilon = 1e-15);
        assert_relative_eq!(mf.dn_dlog10m(1e13, 2.0), 1e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_cutoff_suppresses_massive_halos() {
        let mf = PowerLawMassFunction::default();
        let ratio = mf.dn_dlog10m(1e15, 0.0) / mf.dn_dlog10m(1e12, 0.0);
        assert!(ratio < 1e-4);
    }

    #[test]
    fn test_closure_is_mass_function() {
        let constant = |_m: f64, _z: f64| 0.5;
        let mf: &dyn MassFunction = &constant;
        assert_eq!(mf.dn_dlog10m(1e10, 1.0), 0.5);
    }
}
