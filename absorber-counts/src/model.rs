//! The absorber model: collaborators, settings and the shared table cache.
//!
//! Every pipeline stage is an `impl AbsorberModel` block in its own module
//! ([`profile`](crate::profile), [`radius`](crate::radius),
//! [`area`](crate::area), [`statistics`](crate::statistics)). Public
//! operations take their first argument as an `ndarray` array of any shape
//! and return an array of the same shape, evaluated elementwise.

use std::sync::Arc;

use ndarray::{Array, ArrayBase, Data, Dimension};

use crate::cache::{CacheKey, InterpolationCache, Quantity};
use crate::cosmology::{Cosmology, FlatLcdm, HaloStructure, VirialRelations};
use crate::error::{ensure_non_negative, ensure_positive, Result};
use crate::mass_function::{MassFunction, PowerLawMassFunction};
use crate::params::ModelParams;
use crate::profiles::{Halo, HaloProfile, ProfileRegistry};
use crate::settings::ModelSettings;
use crate::sources::{PowerLawSources, SourcePopulation};

/// Forecasting model for intervening 21-cm absorbers.
///
/// Cheap to clone: collaborators and the cache are shared. Models that share
/// a cache must also share their collaborators, since cache keys only carry
/// the parameters, covariates and table settings.
#[derive(Clone)]
pub struct AbsorberModel {
    halos: Arc<dyn HaloStructure>,
    cosmology: Arc<dyn Cosmology>,
    mass_function: Arc<dyn MassFunction>,
    sources: Arc<dyn SourcePopulation>,
    profiles: ProfileRegistry,
    settings: ModelSettings,
    scope: u64,
    cache: Arc<InterpolationCache>,
}

impl std::fmt::Debug for AbsorberModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbsorberModel")
            .field("profiles", &self.profiles)
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl AbsorberModel {
    /// Model with default settings, built-in profile families and a fresh cache.
    pub fn new(
        halos: Arc<dyn HaloStructure>,
        cosmology: Arc<dyn Cosmology>,
        mass_function: Arc<dyn MassFunction>,
        sources: Arc<dyn SourcePopulation>,
    ) -> Self {
        let settings = ModelSettings::default();
        Self {
            halos,
            cosmology,
            mass_function,
            sources,
            profiles: ProfileRegistry::default(),
            scope: settings.fingerprint(),
            settings,
            cache: Arc::new(InterpolationCache::new()),
        }
    }

    /// Model built from the reference collaborators: flat LCDM, 200-critical
    /// virial relations, a power-law mass function and power-law sources.
    pub fn reference() -> Self {
        let cosmology: Arc<dyn Cosmology> = Arc::new(FlatLcdm::default());
        Self::new(
            Arc::new(VirialRelations::new(cosmology.clone())),
            cosmology,
            Arc::new(PowerLawMassFunction::default()),
            Arc::new(PowerLawSources::default()),
        )
    }

    /// Replace the settings after checking them.
    pub fn with_settings(mut self, settings: ModelSettings) -> Result<Self> {
        settings.validate()?;
        self.scope = settings.fingerprint();
        self.settings = settings;
        Ok(self)
    }

    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    /// Use a shared cache instead of a private one.
    ///
    /// Cache keys carry the quantity, its covariates, the canonical
    /// parameters and the settings fingerprint. They do not identify the
    /// collaborators or the [`ProfileRegistry`]: models sharing a cache must
    /// register the same family under each `profile_model` name, or they will
    /// read each other's tables.
    pub fn with_cache(mut self, cache: Arc<InterpolationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<InterpolationCache> {
        &self.cache
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn cosmology(&self) -> &dyn Cosmology {
        self.cosmology.as_ref()
    }

    pub fn halo_structure(&self) -> &dyn HaloStructure {
        self.halos.as_ref()
    }

    pub fn mass_function(&self) -> &dyn MassFunction {
        self.mass_function.as_ref()
    }

    pub fn sources(&self) -> &dyn SourcePopulation {
        self.sources.as_ref()
    }

    /// Halo of mass `m` at redshift `z` with its virial scales.
    pub fn halo(&self, m: f64, z: f64) -> Result<Halo> {
        let mass = ensure_positive("mass", m)?;
        let redshift = ensure_non_negative("redshift", z)?;
        Ok(Halo {
            mass,
            redshift,
            virial_radius: self.halos.virial_radius(mass, redshift),
            virial_velocity: self.halos.virial_velocity(mass, redshift),
        })
    }

    /// Profile of the selected family for `halo`.
    pub(crate) fn halo_profile(
        &self,
        halo: &Halo,
        params: &ModelParams,
    ) -> Result<Box<dyn HaloProfile>> {
        self.profiles.resolve(params)?.profile(halo, params)
    }

    pub(crate) fn key(
        &self,
        quantity: Quantity,
        covariates: &[f64],
        params: &ModelParams,
    ) -> CacheKey {
        CacheKey::new(quantity, covariates, params).with_scope(self.scope)
    }

    /// Comoving distance per unit redshift in Mpc/h.
    pub(crate) fn dr_dz(&self, z: f64) -> f64 {
        self.cosmology.comoving_distance_per_redshift(z)
    }

    /// Mass-grid nodes in log10, used as integration breakpoints.
    pub(crate) fn log10_mass_nodes(&self) -> Vec<f64> {
        self.settings.grids.mass.log10_nodes()
    }

    /// Clamp a mass to the mass grid.
    pub(crate) fn clamp_mass(&self, m: f64) -> f64 {
        let axis = &self.settings.grids.mass;
        m.clamp(axis.min(), axis.max())
    }
}

/// Apply `f` to every element of `input`, keeping its shape.
pub(crate) fn elementwise<S, D, F>(input: &ArrayBase<S, D>, mut f: F) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
    F: FnMut(f64) -> Result<f64>,
{
    let values = input.iter().map(|&x| f(x)).collect::<Result<Vec<f64>>>()?;
    Ok(Array::from_shape_vec(input.raw_dim(), values)?)
}
