//! Radial HI density and spin temperature models.
//!
//! A [`ProfileFamily`] turns a halo and the model parameters into a concrete
//! [`HaloProfile`]. Families are looked up by the `profile_model` parameter in
//! a [`ProfileRegistry`]; the registry ships with two built-in families:
//!
//! - `exponential`: `rho_HI ∝ exp(-r / r_s)`, `r_s = scale_radius_fraction * r_vir`
//! - `cored_isothermal`: `rho_HI ∝ 1 / (1 + (r / r_c)^2)`, `r_c = core_radius_fraction * r_vir`
//!
//! Both hold `hi_mass_fraction * m` of HI inside the virial radius at a
//! constant `spin_temperature`.
//!
//! Densities are comoving (M_sun/h)/(Mpc/h)^3 at comoving radii in Mpc/h;
//! spin temperatures are in K.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::error::{AbsorberError, Result};
use crate::params::ModelParams;

/// Default HI mass as a fraction of halo mass.
pub const DEFAULT_HI_MASS_FRACTION: f64 = 0.01;
/// Default exponential scale radius as a fraction of the virial radius.
pub const DEFAULT_SCALE_RADIUS_FRACTION: f64 = 0.05;
/// Default isothermal core radius as a fraction of the virial radius.
pub const DEFAULT_CORE_RADIUS_FRACTION: f64 = 0.02;
/// Default spin temperature in K.
pub const DEFAULT_SPIN_TEMPERATURE: f64 = 100.0;

/// A halo of given mass and redshift with its virial scales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Halo {
    /// M_sun/h
    pub mass: f64,
    pub redshift: f64,
    /// Comoving Mpc/h
    pub virial_radius: f64,
    /// km/s
    pub virial_velocity: f64,
}

/// HI content of one halo as a function of comoving radius.
pub trait HaloProfile: Send + Sync {
    /// HI mass density at radius `r`.
    fn hi_density(&self, r: f64) -> f64;

    /// Spin temperature at radius `r`.
    fn spin_temperature(&self, r: f64) -> f64;

    /// HI density over spin temperature.
    fn density_over_temperature(&self, r: f64) -> f64 {
        self.hi_density(r) / self.spin_temperature(r)
    }
}

/// A named family of halo profiles.
pub trait ProfileFamily: Send + Sync {
    /// Name used as the `profile_model` parameter.
    fn name(&self) -> &str;

    /// Profile of `halo` under `params`.
    fn profile(&self, halo: &Halo, params: &ModelParams) -> Result<Box<dyn HaloProfile>>;
}

/// Families available to a model, by name.
#[derive(Clone)]
pub struct ProfileRegistry {
    families: BTreeMap<String, Arc<dyn ProfileFamily>>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ExponentialFamily));
        registry.register(Arc::new(CoredIsothermalFamily));
        registry
    }
}

impl fmt::Debug for ProfileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.families.keys()).finish()
    }
}

impl ProfileRegistry {
    /// Registry holding the built-in families.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry without any family.
    pub fn empty() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Add a family, replacing any family of the same name.
    pub fn register(&mut self, family: Arc<dyn ProfileFamily>) {
        self.families.insert(family.name().to_string(), family);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, family: Arc<dyn ProfileFamily>) -> Self {
        self.register(family);
        self
    }

    /// Registered family names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.families.keys().cloned().collect()
    }

    /// Family named by `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ProfileFamily>> {
        self.families
            .get(name)
            .cloned()
            .ok_or_else(|| AbsorberError::UnknownProfileModel {
                name: name.to_string(),
                known: self.names(),
            })
    }

    /// Family selected by the `profile_model` parameter.
    pub fn resolve(&self, params: &ModelParams) -> Result<Arc<dyn ProfileFamily>> {
        self.get(params.profile_model()?)
    }
}

fn shared_knobs(params: &ModelParams) -> Result<(f64, f64)> {
    Ok((
        params.positive_or("hi_mass_fraction", DEFAULT_HI_MASS_FRACTION)?,
        params.positive_or("spin_temperature", DEFAULT_SPIN_TEMPERATURE)?,
    ))
}

/// Exponential HI disk-like sphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialFamily;

/// Concrete exponential profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialProfile {
    pub central_density: f64,
    pub scale_radius: f64,
    pub spin_temperature: f64,
}

impl ProfileFamily for ExponentialFamily {
    fn name(&self) -> &str {
        "exponential"
    }

    fn profile(&self, halo: &Halo, params: &ModelParams) -> Result<Box<dyn HaloProfile>> {
        let (hi_fraction, spin_temperature) = shared_knobs(params)?;
        let scale_radius = halo.virial_radius
            * params.positive_or("scale_radius_fraction", DEFAULT_SCALE_RADIUS_FRACTION)?;

        // M(<r_vir) = 4 pi rho0 rs^3 [2 - e^-c (c^2 + 2c + 2)], c = r_vir / rs
        let c = halo.virial_radius / scale_radius;
        let shape = 2.0 - (-c).exp() * (c * c + 2.0 * c + 2.0);
        let central_density =
            hi_fraction * halo.mass / (4.0 * PI * scale_radius.powi(3) * shape);

        Ok(Box::new(ExponentialProfile {
            central_density,
            scale_radius,
            spin_temperature,
        }))
    }
}

impl HaloProfile for ExponentialProfile {
    fn hi_density(&self, r: f64) -> f64 {
        self.central_density * (-r / self.scale_radius).exp()
    }

    fn spin_temperature(&self, _r: f64) -> f64 {
        self.spin_temperature
    }
}

/// Isothermal sphere with a constant-density core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoredIsothermalFamily;

/// Concrete cored isothermal profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoredIsothermalProfile {
    pub central_density: f64,
    pub core_radius: f64,
    pub spin_temperature: f64,
}

impl ProfileFamily for CoredIsothermalFamily {
    fn name(&self) -> &str {
        "cored_isothermal"
    }

    fn profile(&self, halo: &Halo, params: &ModelParams) -> Result<Box<dyn HaloProfile>> {
        let (hi_fraction, spin_temperature) = shared_knobs(params)?;
        let core_radius = halo.virial_radius
            * params.positive_or("core_radius_fraction", DEFAULT_CORE_RADIUS_FRACTION)?;

        // M(<r_vir) = 4 pi rho0 rc^3 (c - atan c)
        let c = halo.virial_radius / core_radius;
        let central_density =
            hi_fraction * halo.mass / (4.0 * PI * core_radius.powi(3) * (c - c.atan()));

        Ok(Box::new(CoredIsothermalProfile {
            central_density,
            core_radius,
            spin_temperature,
        }))
    }
}

impl HaloProfile for CoredIsothermalProfile {
    fn hi_density(&self, r: f64) -> f64 {
        let x = r / self.core_radius;
        self.central_density / (1.0 + x * x)
    }

    fn spin_temperature(&self, _r: f64) -> f64 {
        self.spin_temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use halo_math::{integrate, QuadratureConfig};

    fn halo() -> Halo {
        Halo {
            mass: 1e12,
            redshift: 1.0,
            virial_radius: 0.15,
            virial_velocity: 180.0,
        }
    }

    fn enclosed_hi(profile: &dyn HaloProfile, radius: f64) -> f64 {
        integrate(
            |r: f64| Ok::<_, AbsorberError>(4.0 * PI * r * r * profile.hi_density(r)),
            0.0,
            radius,
            &QuadratureConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_families_normalize_hi_mass() {
        let registry = ProfileRegistry::new();
        let params = ModelParams::new().with("hi_mass_fraction", 0.02);
        let halo = halo();

        for name in ["exponential", "cored_isothermal"] {
            let profile = registry.get(name).unwrap().profile(&halo, &params).unwrap();
            assert_relative_eq!(
                enclosed_hi(profile.as_ref(), halo.virial_radius),
                0.02 * halo.mass,
                max_relative = 1e-7
            );
        }
    }

    #[test]
    fn test_density_decreases_outward() {
        let registry = ProfileRegistry::new();
        let halo = halo();
        for name in registry.names() {
            let profile = registry
                .get(&name)
                .unwrap()
                .profile(&halo, &ModelParams::new())
                .unwrap();
            let inner = profile.density_over_temperature(0.01);
            let outer = profile.density_over_temperature(0.1);
            assert!(inner > outer, "{name}: {inner} <= {outer}");
        }
    }

    #[test]
    fn test_spin_temperature_knob() {
        let params = ModelParams::new().with("spin_temperature", 250.0);
        let profile = ExponentialFamily.profile(&halo(), &params).unwrap();
        assert_eq!(profile.spin_temperature(0.05), 250.0);
        assert_relative_eq!(
            profile.density_over_temperature(0.05),
            profile.hi_density(0.05) / 250.0,
            max_relative = 1e-15
        );
    }

    #[test]
    fn test_resolve_default_and_unknown() {
        let registry = ProfileRegistry::new();
        assert_eq!(registry.resolve(&ModelParams::new()).unwrap().name(), "exponential");

        let err = registry
            .resolve(&ModelParams::new().with("profile_model", "nfw"))
            .err()
            .unwrap();
        assert!(err.is_domain_error());
        assert!(matches!(
            err,
            AbsorberError::UnknownProfileModel { ref known, .. } if known.len() == 2
        ));
    }

    #[test]
    fn test_invalid_knob_rejected() {
        let params = ModelParams::new().with("scale_radius_fraction", 0.0);
        assert!(ExponentialFamily.profile(&halo(), &params).is_err());
    }
}
