//! Background cosmology and halo structure relations.
//!
//! The absorber pipeline only needs a handful of relations from the outside
//! world: the expansion rate (to turn comoving densities into counts per
//! redshift) and the virial radius and velocity of a halo. They are consumed
//! through the [`Cosmology`] and [`HaloStructure`] traits so a caller can plug
//! in a full cosmology package; [`FlatLcdm`] and [`VirialRelations`] are
//! self-contained reference implementations.
//!
//! Units follow the halo-model convention: masses in M_sun/h, lengths in
//! comoving Mpc/h, velocities in km/s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{G_MPC_KMS2_PER_MSUN, RHO_CRIT_0, SPEED_OF_LIGHT_KMS};

/// Expansion history.
pub trait Cosmology: Send + Sync {
    /// Hubble rate H(z) in km/s/Mpc.
    fn hubble_rate(&self, z: f64) -> f64;

    /// Dimensionless Hubble constant h.
    fn little_h(&self) -> f64;

    /// E(z) = H(z) / H0.
    fn efunc(&self, z: f64) -> f64 {
        self.hubble_rate(z) / (100.0 * self.little_h())
    }

    /// Comoving distance per unit redshift, dr/dz = c / H(z), in Mpc/h.
    fn comoving_distance_per_redshift(&self, z: f64) -> f64 {
        SPEED_OF_LIGHT_KMS / self.hubble_rate(z) * self.little_h()
    }

    /// Critical density at z in (M_sun/h)/(Mpc/h)^3, proper volume.
    fn critical_density(&self, z: f64) -> f64 {
        RHO_CRIT_0 * self.efunc(z).powi(2)
    }
}

/// Spatially flat Lambda-CDM, radiation neglected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatLcdm {
    pub h: f64,
    pub omega_m: f64,
}

impl Default for FlatLcdm {
    /// Planck 2015 parameters.
    fn default() -> Self {
        Self {
            h: 0.6774,
            omega_m: 0.3089,
        }
    }
}

impl FlatLcdm {
    pub fn new(h: f64, omega_m: f64) -> Self {
        Self { h, omega_m }
    }
}

impl Cosmology for FlatLcdm {
    fn hubble_rate(&self, z: f64) -> f64 {
        let a3 = (1.0 + z).powi(3);
        100.0 * self.h * (self.omega_m * a3 + (1.0 - self.omega_m)).sqrt()
    }

    fn little_h(&self) -> f64 {
        self.h
    }
}

/// Virial radius and circular velocity of a halo.
pub trait HaloStructure: Send + Sync {
    /// Virial radius in comoving Mpc/h.
    fn virial_radius(&self, m: f64, z: f64) -> f64;

    /// Circular velocity at the virial radius in km/s.
    fn virial_velocity(&self, m: f64, z: f64) -> f64;
}

/// Spherical overdensity halos: mean density `overdensity` times critical.
#[derive(Clone)]
pub struct VirialRelations {
    cosmology: Arc<dyn Cosmology>,
    overdensity: f64,
}

impl VirialRelations {
    /// Halos at 200 times the critical density.
    pub fn new(cosmology: Arc<dyn Cosmology>) -> Self {
        Self::with_overdensity(cosmology, 200.0)
    }

    pub fn with_overdensity(cosmology: Arc<dyn Cosmology>, overdensity: f64) -> Self {
        Self {
            cosmology,
            overdensity,
        }
    }

    fn proper_radius(&self, m: f64, z: f64) -> f64 {
        let rho = self.overdensity * self.cosmology.critical_density(z);
        (3.0 * m / (4.0 * std::f64::consts::PI * rho)).cbrt()
    }
}

impl std::fmt::Debug for VirialRelations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirialRelations")
            .field("overdensity", &self.overdensity)
            .finish()
    }
}

impl HaloStructure for VirialRelations {
    fn virial_radius(&self, m: f64, z: f64) -> f64 {
        self.proper_radius(m, z) * (1.0 + z)
    }

    fn virial_velocity(&self, m: f64, z: f64) -> f64 {
        (G_MPC_KMS2_PER_MSUN * m / self.proper_radius(m, z)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hubble_rate_today() {
        let cosmo = FlatLcdm::default();
        assert_relative_eq!(cosmo.hubble_rate(0.0), 67.74, epsilon = 1e-10);
        assert_relative_eq!(cosmo.efunc(0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matter_dominated_limit() {
        let cosmo = FlatLcdm::new(0.7, 1.0);
        let z = 3.0;
        assert_relative_eq!(cosmo.efunc(z), 8.0, epsilon = 1e-12);
        assert_relative_eq!(
            cosmo.comoving_distance_per_redshift(z),
            SPEED_OF_LIGHT_KMS / (70.0 * 8.0) * 0.7,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_virial_radius_milky_way() {
        let cosmo: Arc<dyn Cosmology> = Arc::new(FlatLcdm::default());
        let halos = VirialRelations::new(cosmo);

        let r = halos.virial_radius(1e12, 0.0);
        assert_relative_eq!(r, 0.1627, max_relative = 1e-3);
        let v = halos.virial_velocity(1e12, 0.0);
        assert!(v > 150.0 && v < 175.0, "v = {v}");
    }

    #[test]
    fn test_virial_mass_consistency() {
        let cosmo: Arc<dyn Cosmology> = Arc::new(FlatLcdm::default());
        let halos = VirialRelations::new(cosmo.clone());
        let (m, z) = (3e11, 1.5);

        // Mass enclosed at the proper virial radius is the halo mass
        let r_proper = halos.virial_radius(m, z) / (1.0 + z);
        let mass = 4.0 / 3.0 * std::f64::consts::PI
            * r_proper.powi(3)
            * 200.0
            * cosmo.critical_density(z);
        assert_relative_eq!(mass, m, max_relative = 1e-12);

        // v^2 = G m / r
        let v = halos.virial_velocity(m, z);
        assert_relative_eq!(v * v * r_proper / G_MPC_KMS2_PER_MSUN, m, max_relative = 1e-12);
    }

    #[test]
    fn test_radius_grows_with_mass() {
        let halos = VirialRelations::new(Arc::new(FlatLcdm::default()));
        assert!(halos.virial_radius(1e13, 1.0) > halos.virial_radius(1e12, 1.0));
        assert_relative_eq!(
            halos.virial_radius(8e12, 1.0) / halos.virial_radius(1e12, 1.0),
            2.0,
            max_relative = 1e-12
        );
    }
}
