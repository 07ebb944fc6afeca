//! Line-of-sight column densities and 21-cm optical depth profiles.
//!
//! The frequency-integrated optical depth through a halo at impact parameter
//! `b` is proportional to the column of HI over spin temperature:
//!
//! ```text
//! N_HI/T_s(b) = 2 ∫_0^sqrt(r_vir^2 - b^2) rho_HI(r) / T_s(r) dx,   r = sqrt(b^2 + x^2)
//! tau_int(b)  = 3 c^2 h A_10 / (32 pi k_B nu_21) * N_HI/T_s(b)      [Hz]
//! ```
//!
//! and vanishes outside the virial radius. The line is a Gaussian in velocity
//! of width [`sigma_line`](AbsorberModel::sigma_line), so the optical depth at
//! a velocity offset `v` is
//!
//! ```text
//! tau(b, v) = tau_int(b) exp(-v^2 / 2 sigma^2) c / (sqrt(2 pi) sigma nu_21)
//! ```
//!
//! At fixed redshift and parameters, `tau_int` is tabulated once over
//! (ln m, ln b/r_vir) and reused; [`ProfileLookup::Direct`] bypasses the
//! table.

use std::f64::consts::PI;
use std::sync::Arc;

use halo_math::{integrate, Surface2d};
use ndarray::{Array, Array2, ArrayBase, Data, Dimension};

use crate::cache::Quantity;
use crate::constants::{
    F21, MPC, M_PROTON, M_SUN, NHI_OVER_TS_TO_TAU, SPEED_OF_LIGHT_KMS, W90_PER_SIGMA,
};
use crate::error::{ensure_non_negative, ensure_positive, AbsorberError, Result};
use crate::model::{elementwise, AbsorberModel};
use crate::params::ModelParams;
use crate::profiles::{Halo, HaloProfile};

/// Where along the line the optical depth is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineOffset {
    /// Rest-frame frequency of the halo in Hz
    Frequency(f64),
    /// Line-of-sight velocity relative to the halo in km/s
    Velocity(f64),
}

impl LineOffset {
    /// Velocity offset in km/s.
    pub fn velocity_kms(&self) -> Result<f64> {
        match *self {
            LineOffset::Frequency(f) => {
                let f = ensure_positive("frequency", f)?;
                Ok((f / F21 - 1.0).abs() * SPEED_OF_LIGHT_KMS)
            }
            LineOffset::Velocity(v) if v.is_finite() => Ok(v),
            LineOffset::Velocity(v) => Err(AbsorberError::InvalidDomainInput {
                name: "velocity",
                value: v,
                reason: "must be finite",
            }),
        }
    }
}

/// How the integrated optical depth is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileLookup {
    /// Interpolate the cached (mass, radius) table
    Surface,
    /// Slope of the cached table with respect to ln r
    SurfaceLogRadiusSlope,
    /// Integrate the profile directly, bypassing the cache
    Direct,
}

/// Options for [`AbsorberModel::tau_gaussian`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineQuery {
    pub offset: LineOffset,
    /// Return the frequency-integrated optical depth (Hz) and ignore the offset
    pub integrated: bool,
    pub lookup: ProfileLookup,
}

impl Default for LineQuery {
    /// Line-centre optical depth from the cached table.
    fn default() -> Self {
        Self {
            offset: LineOffset::Velocity(0.0),
            integrated: false,
            lookup: ProfileLookup::Surface,
        }
    }
}

impl LineQuery {
    /// Optical depth at the line centre.
    pub fn line_centre() -> Self {
        Self::default()
    }

    /// Frequency-integrated optical depth.
    pub fn integrated() -> Self {
        Self {
            integrated: true,
            ..Self::default()
        }
    }

    pub fn at(mut self, offset: LineOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn lookup(mut self, lookup: ProfileLookup) -> Self {
        self.lookup = lookup;
        self
    }
}

/// Peak of a unit-area Gaussian line of width `sigma` km/s, per Hz.
pub(crate) fn line_peak_factor(sigma: f64) -> f64 {
    SPEED_OF_LIGHT_KMS / ((2.0 * PI).sqrt() * sigma * F21)
}

impl AbsorberModel {
    /// Velocity dispersion of the 21-cm line in km/s for halos of mass `m`.
    ///
    /// The W90 width is `peak_velocity_fraction` times the virial velocity.
    pub fn sigma_line<S, D>(
        &self,
        m: &ArrayBase<S, D>,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        elementwise(m, |m| self.line_width(&self.halo(m, z)?, params))
    }

    /// HI column density in proper atoms per m^2 at impact parameters `b`
    /// (comoving Mpc/h).
    pub fn column_density<S, D>(
        &self,
        b: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let halo = self.halo(m, z)?;
        let profile = self.halo_profile(&halo, params)?;
        elementwise(b, |b| {
            let raw = self.line_of_sight(b, &halo, |r| profile.hi_density(r))?;
            Ok(self.proper_column(raw, z))
        })
    }

    /// HI column over spin temperature in proper atoms per m^2 per K.
    pub fn column_density_over_ts<S, D>(
        &self,
        b: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let halo = self.halo(m, z)?;
        let profile = self.halo_profile(&halo, params)?;
        elementwise(b, |b| self.column_over_ts(b, &halo, profile.as_ref()))
    }

    /// 21-cm optical depth at impact parameters `b` (comoving Mpc/h) through a
    /// halo of mass `m` (M_sun/h) at redshift `z`.
    ///
    /// Impact parameters at or beyond the virial radius give exactly zero.
    /// In table mode, ratios `b / r_vir` below the table's innermost node are
    /// clamped to it and masses are clamped to the mass grid.
    pub fn tau_gaussian<S, D>(
        &self,
        b: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
        query: &LineQuery,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let halo = self.halo(m, z)?;
        let scale = if query.integrated {
            1.0
        } else {
            let sigma = self.line_width(&halo, params)?;
            let v = query.offset.velocity_kms()?;
            (-0.5 * (v / sigma).powi(2)).exp() * line_peak_factor(sigma)
        };

        match query.lookup {
            ProfileLookup::Direct => {
                let profile = self.halo_profile(&halo, params)?;
                elementwise(b, |b| {
                    Ok(scale * self.direct_integrated_tau(b, &halo, profile.as_ref())?)
                })
            }
            lookup => {
                let table = self.tau_profile_table(z, params)?;
                let slope = lookup == ProfileLookup::SurfaceLogRadiusSlope;
                elementwise(b, |b| {
                    Ok(scale * self.tabulated_integrated_tau(&table, b, &halo, slope)?)
                })
            }
        }
    }

    /// Line width in km/s.
    pub(crate) fn line_width(&self, halo: &Halo, params: &ModelParams) -> Result<f64> {
        Ok(halo.virial_velocity * params.peak_velocity_fraction()? / W90_PER_SIGMA)
    }

    /// Frequency-integrated optical depth in Hz by direct integration.
    pub(crate) fn direct_integrated_tau(
        &self,
        b: f64,
        halo: &Halo,
        profile: &dyn HaloProfile,
    ) -> Result<f64> {
        Ok(NHI_OVER_TS_TO_TAU * self.column_over_ts(b, halo, profile)?)
    }

    /// Line-centre optical depth by direct integration.
    pub(crate) fn direct_peak_tau(
        &self,
        b: f64,
        halo: &Halo,
        profile: &dyn HaloProfile,
        sigma: f64,
    ) -> Result<f64> {
        Ok(self.direct_integrated_tau(b, halo, profile)? * line_peak_factor(sigma))
    }

    fn column_over_ts(&self, b: f64, halo: &Halo, profile: &dyn HaloProfile) -> Result<f64> {
        let raw = self.line_of_sight(b, halo, |r| profile.density_over_temperature(r))?;
        Ok(self.proper_column(raw, halo.redshift))
    }

    /// `2 ∫ f(sqrt(b^2 + x^2)) dx` along the chord inside the virial radius,
    /// in comoving (M_sun/h)/(Mpc/h)^2 times the units of `f`'s weight.
    fn line_of_sight<F>(&self, b: f64, halo: &Halo, density: F) -> Result<f64>
    where
        F: Fn(f64) -> f64,
    {
        let b = ensure_non_negative("impact parameter", b)?;
        let rv = halo.virial_radius;
        if b >= rv {
            return Ok(0.0);
        }
        let half_chord = (rv * rv - b * b).sqrt();
        let half = integrate(
            |x: f64| Ok::<_, AbsorberError>(density((b * b + x * x).sqrt())),
            0.0,
            half_chord,
            &self.settings().quadrature,
        )?;
        Ok(2.0 * half)
    }

    /// Comoving (M_sun/h)/(Mpc/h)^2 to proper atoms per m^2.
    fn proper_column(&self, raw: f64, z: f64) -> f64 {
        let h = self.cosmology().little_h();
        let atoms = raw * M_SUN / M_PROTON / h;
        atoms / (MPC / h).powi(2) * (1.0 + z).powi(2)
    }

    /// Cached integrated optical depth over (ln m, ln b/r_vir).
    pub(crate) fn tau_profile_table(
        &self,
        z: f64,
        params: &ModelParams,
    ) -> Result<Arc<Surface2d>> {
        let key = self.key(Quantity::TauProfile, &[z], params);
        self.cache().surface(&key, || self.build_tau_profile(z, params))
    }

    fn build_tau_profile(&self, z: f64, params: &ModelParams) -> Result<Surface2d> {
        let grids = &self.settings().grids;
        let masses = grids.mass.nodes();
        let ratio_axis = grids.profile_radius_axis();
        let ratios = ratio_axis.nodes();

        let mut values = Array2::zeros((masses.len(), ratios.len()));
        for (i, &m) in masses.iter().enumerate() {
            let halo = self.halo(m, z)?;
            let profile = self.halo_profile(&halo, params)?;
            for (j, &ratio) in ratios.iter().enumerate() {
                values[[i, j]] =
                    self.direct_integrated_tau(ratio * halo.virial_radius, &halo, profile.as_ref())?;
            }
        }

        Ok(Surface2d::new(grids.mass.ln_nodes(), ratio_axis.ln_nodes(), values)?)
    }

    /// Integrated optical depth (or its ln r slope) from the table.
    fn tabulated_integrated_tau(
        &self,
        table: &Surface2d,
        b: f64,
        halo: &Halo,
        slope: bool,
    ) -> Result<f64> {
        let b = ensure_non_negative("impact parameter", b)?;
        let ratio = b / halo.virial_radius;
        if ratio >= 1.0 {
            return Ok(0.0);
        }
        let ln_ratio = ratio.ln().max(table.y_range().0);
        let ln_m = halo.mass.ln();
        Ok(if slope {
            table.derivative_y(ln_m, ln_ratio)
        } else {
            table.evaluate(ln_m, ln_ratio)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ModelSettings;
    use approx::assert_relative_eq;
    use ndarray::{arr0, array, Array1};

    fn model() -> AbsorberModel {
        AbsorberModel::reference()
            .with_settings(ModelSettings::coarse())
            .unwrap()
    }

    #[test]
    fn test_zero_outside_virial_radius() {
        let model = model();
        let params = ModelParams::new();
        let rv = model.halo(1e12, 1.0).unwrap().virial_radius;
        let b = array![rv, 1.5 * rv, 10.0 * rv];

        for lookup in [
            ProfileLookup::Surface,
            ProfileLookup::SurfaceLogRadiusSlope,
            ProfileLookup::Direct,
        ] {
            let tau = model
                .tau_gaussian(&b, 1e12, 1.0, &params, &LineQuery::default().lookup(lookup))
                .unwrap();
            assert!(tau.iter().all(|&t| t == 0.0), "{lookup:?}: {tau}");
        }
    }

    #[test]
    fn test_table_matches_direct_at_nodes() {
        let model = model();
        let params = ModelParams::new();
        let (m, z) = (1e12, 1.0);
        let rv = model.halo(m, z).unwrap().virial_radius;
        let ratios = model.settings().grids.profile_radius_axis().nodes();
        let b: Array1<f64> = [ratios[0], ratios[10], ratios[25]]
            .iter()
            .map(|r| r * rv)
            .collect();

        let table = model
            .tau_gaussian(&b, m, z, &params, &LineQuery::integrated())
            .unwrap();
        let direct = model
            .tau_gaussian(
                &b,
                m,
                z,
                &params,
                &LineQuery::integrated().lookup(ProfileLookup::Direct),
            )
            .unwrap();
        for (t, d) in table.iter().zip(direct.iter()) {
            assert_relative_eq!(*t, *d, max_relative = 1e-6);
        }
        assert_eq!(model.cache().build_count(), 1);
    }

    #[test]
    fn test_exponential_central_column() {
        let model = model();
        let params = ModelParams::new();
        let (m, z) = (1e12, 0.5);
        let halo = model.halo(m, z).unwrap();

        // N(0) = 2 rho0 rs (1 - e^-c) for rho = rho0 exp(-r / rs)
        let rs = 0.05 * halo.virial_radius;
        let c = halo.virial_radius / rs;
        let shape = 2.0 - (-c).exp() * (c * c + 2.0 * c + 2.0);
        let rho0 = 0.01 * m / (4.0 * PI * rs.powi(3) * shape);
        let raw = 2.0 * rho0 * rs * (1.0 - (-c).exp());

        let column = model.column_density(&arr0(0.0), m, z, &params).unwrap();
        assert_relative_eq!(
            column.into_scalar(),
            model.proper_column(raw, z),
            max_relative = 1e-6
        );

        let over_ts = model
            .column_density_over_ts(&arr0(0.0), m, z, &params)
            .unwrap();
        assert_relative_eq!(
            over_ts.into_scalar(),
            model.proper_column(raw, z) / 100.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_line_centre_is_gaussian_peak() {
        let model = model();
        let params = ModelParams::new();
        let (m, z) = (1e12, 1.0);
        let b = array![0.01];
        let sigma = model.sigma_line(&arr0(m), z, &params).unwrap().into_scalar();

        let direct = LineQuery::integrated().lookup(ProfileLookup::Direct);
        let integrated = model.tau_gaussian(&b, m, z, &params, &direct).unwrap()[0];
        let centre = model
            .tau_gaussian(&b, m, z, &params, &LineQuery { integrated: false, ..direct })
            .unwrap()[0];
        assert_relative_eq!(centre, integrated * line_peak_factor(sigma), max_relative = 1e-12);

        // One sigma off centre in either direction
        let off = |v: f64| {
            model
                .tau_gaussian(
                    &b,
                    m,
                    z,
                    &params,
                    &LineQuery { integrated: false, ..direct }.at(LineOffset::Velocity(v)),
                )
                .unwrap()[0]
        };
        assert_relative_eq!(off(sigma), centre * (-0.5f64).exp(), max_relative = 1e-12);
        assert_relative_eq!(off(-sigma), off(sigma), max_relative = 1e-12);
    }

    #[test]
    fn test_frequency_offset_matches_velocity() {
        let v = LineOffset::Frequency(F21 * (1.0 + 50.0 / SPEED_OF_LIGHT_KMS))
            .velocity_kms()
            .unwrap();
        assert_relative_eq!(v, 50.0, max_relative = 1e-9);
        assert_eq!(LineOffset::Frequency(F21).velocity_kms().unwrap(), 0.0);
        assert!(LineOffset::Frequency(-1.0).velocity_kms().is_err());
    }

    #[test]
    fn test_sigma_line_scales_with_fraction() {
        let model = model();
        let m = array![1e11, 1e12];
        let full = model.sigma_line(&m, 1.0, &ModelParams::new()).unwrap();
        let half = model
            .sigma_line(&m, 1.0, &ModelParams::new().with("peak_velocity_fraction", 0.5))
            .unwrap();
        assert_relative_eq!(half[1], 0.5 * full[1], max_relative = 1e-12);
        assert!(full[1] > full[0]);

        let vv = model.halo(1e12, 1.0).unwrap().virial_velocity;
        assert_relative_eq!(full[1], vv / W90_PER_SIGMA, max_relative = 1e-12);
    }

    #[test]
    fn test_log_radius_slope_is_negative_inside() {
        let model = model();
        let rv = model.halo(1e12, 1.0).unwrap().virial_radius;
        let b = array![0.05 * rv, 0.2 * rv, 0.6 * rv];
        let slope = model
            .tau_gaussian(
                &b,
                1e12,
                1.0,
                &ModelParams::new(),
                &LineQuery::default().lookup(ProfileLookup::SurfaceLogRadiusSlope),
            )
            .unwrap();
        assert!(slope.iter().all(|&s| s < 0.0), "{slope}");
    }

    #[test]
    fn test_invalid_inputs() {
        let model = model();
        let params = ModelParams::new();
        let query = LineQuery::default();
        assert!(model
            .tau_gaussian(&array![-0.1], 1e12, 1.0, &params, &query)
            .unwrap_err()
            .is_domain_error());
        assert!(model
            .tau_gaussian(&array![0.1], -1e12, 1.0, &params, &query)
            .unwrap_err()
            .is_domain_error());
        assert!(model
            .tau_gaussian(&array![0.1], 1e12, -1.0, &params, &query)
            .unwrap_err()
            .is_domain_error());
        let unknown = ModelParams::new().with("profile_model", "nfw");
        assert!(matches!(
            model.tau_gaussian(&array![0.1], 1e12, 1.0, &unknown, &query),
            Err(AbsorberError::UnknownProfileModel { .. })
        ));
    }
}
