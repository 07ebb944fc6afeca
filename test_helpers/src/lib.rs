//! Test helpers for the absorber-counts workspace
//!
//! Fixtures shared by integration tests: logger setup, quick models on the
//! coarse grids, and a uniform-sphere profile family whose optical depth
//! inverts in closed form.

use std::f64::consts::PI;
use std::sync::Arc;

use absorber_counts::params::ModelParams;
use absorber_counts::profiles::{Halo, HaloProfile, ProfileFamily, ProfileRegistry};
use absorber_counts::{AbsorberModel, ModelSettings, Result};
use once_cell::sync::Lazy;

/// Registry name of [`UniformSphereFamily`].
pub const UNIFORM_SPHERE: &str = "uniform_sphere";

/// Masses (M_sun/h) used across the integration tests.
pub static TEST_MASSES: Lazy<Vec<f64>> = Lazy::new(|| vec![1e10, 1e11, 1e12, 1e13]);

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Reference model on the coarse grids with a private cache.
pub fn coarse_model() -> AbsorberModel {
    AbsorberModel::reference()
        .with_settings(ModelSettings::coarse())
        .expect("coarse settings are valid")
}

/// [`coarse_model`] that also knows the uniform sphere.
pub fn toy_model() -> AbsorberModel {
    coarse_model().with_profiles(ProfileRegistry::default().with(Arc::new(UniformSphereFamily)))
}

/// Parameters selecting the uniform sphere.
pub fn uniform_sphere_params() -> ModelParams {
    ModelParams::new().with("profile_model", UNIFORM_SPHERE)
}

/// HI spread evenly through the virial sphere at one spin temperature.
///
/// The column through impact parameter `b` is proportional to the chord,
/// so `tau(b) = tau0 sqrt(1 - (b / r_vir)^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSphereFamily;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSphereProfile {
    pub density: f64,
    pub radius: f64,
    pub spin_temperature: f64,
}

impl ProfileFamily for UniformSphereFamily {
    fn name(&self) -> &str {
        UNIFORM_SPHERE
    }

    fn profile(&self, halo: &Halo, params: &ModelParams) -> Result<Box<dyn HaloProfile>> {
        let hi_fraction = params.positive_or("hi_mass_fraction", 0.01)?;
        let spin_temperature = params.positive_or("spin_temperature", 100.0)?;
        let radius = halo.virial_radius;
        Ok(Box::new(UniformSphereProfile {
            density: hi_fraction * halo.mass / (4.0 / 3.0 * PI * radius.powi(3)),
            radius,
            spin_temperature,
        }))
    }
}

impl HaloProfile for UniformSphereProfile {
    fn hi_density(&self, r: f64) -> f64 {
        if r <= self.radius {
            self.density
        } else {
            0.0
        }
    }

    fn spin_temperature(&self, _r: f64) -> f64 {
        self.spin_temperature
    }
}

/// Closed-form radius at which a uniform sphere of central optical depth
/// `central_tau` and radius `radius` reaches `tau`.
pub fn uniform_sphere_radius(tau: f64, central_tau: f64, radius: f64) -> f64 {
    if tau >= central_tau {
        return 0.0;
    }
    radius * (1.0 - (tau / central_tau).powi(2)).sqrt()
}
