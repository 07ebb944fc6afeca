//! Population statistics: absorber counts weighted by the halo mass function.
//!
//! Every count is an integral over log10 halo mass of the mass function times
//! a per-halo cross-section, split at the nodes of the mass grid. Counts per
//! unit redshift are further multiplied by the comoving distance per unit
//! redshift. Each statistic is tabulated once per (redshift, covariates,
//! parameters) as a curve over the log of its first argument and evaluated
//! from the curve afterwards.

use std::f64::consts::{LN_10, PI};
use std::sync::Arc;

use halo_math::{integrate_piecewise, Curve1d, LogAxis, Surface2d};
use ndarray::{Array, ArrayBase, Data, Dimension};

use crate::cache::Quantity;
use crate::constants::{F21, SPEED_OF_LIGHT_KMS};
use crate::error::{ensure_non_negative, ensure_positive, AbsorberError, Result};
use crate::model::{elementwise, AbsorberModel};
use crate::params::ModelParams;
use crate::profiles::Halo;
use crate::radius::Derivative;

/// Floor on the transmitted fraction when converting a detection threshold
/// to an optical depth.
const MIN_TRANSMISSION: f64 = 1e-100;

/// Optical depth that absorbs `rline / snr` of a source's flux.
fn detection_threshold(snr: f64, rline: f64) -> f64 {
    -(1.0 - rline / snr).max(MIN_TRANSMISSION).ln()
}

/// Make tabulated cumulative counts non-increasing.
///
/// Neighbouring samples can differ by less than the integration tolerance.
fn enforce_non_increasing(samples: &mut [f64]) {
    for j in 1..samples.len() {
        if samples[j] > samples[j - 1] {
            samples[j] = samples[j - 1];
        }
    }
}

/// Ascending breakpoints: `lower`, every `offset - node` strictly inside
/// (lower, upper), and `upper`.
fn image_breakpoints(lower: f64, upper: f64, offset: f64, nodes: &[f64]) -> Vec<f64> {
    let mut points = vec![lower];
    let mut inner: Vec<f64> = nodes
        .iter()
        .map(|node| offset - node)
        .filter(|&p| p > lower && p < upper)
        .collect();
    inner.sort_by(f64::total_cmp);
    points.extend(inner);
    points.push(upper);
    points
}

impl AbsorberModel {
    /// Number of absorbers per unit redshift with line-centre optical depth
    /// above `tau`. Thresholds outside the tau grid are clamped to it.
    pub fn dn_dz_tau<S, D>(
        &self,
        tau: &ArrayBase<S, D>,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let curve = self.dn_dz_tau_curve(z, params)?;
        let axis = self.settings().grids.tau;
        elementwise(tau, |tau| {
            let tau = ensure_positive("tau", tau)?;
            Ok(curve.evaluate(tau.clamp(axis.min(), axis.max()).ln()))
        })
    }

    /// Number of absorbers per comoving Mpc/h detectable at signal-to-noise
    /// `snr` against a source, with channels `channel_width` Hz wide.
    ///
    /// Zero below the snr grid; clamped to the grid maximum above it.
    pub fn dn_dr<S, D>(
        &self,
        snr: &ArrayBase<S, D>,
        channel_width: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let curve = self.dn_dr_curve(channel_width, z, params)?;
        elementwise(snr, |snr| self.dn_dr_value(&curve, snr))
    }

    /// [`dn_dr`](Self::dn_dr) integrated over mass at each `snr` without
    /// tabulating a curve over snr, so it is not limited to the snr grid.
    /// The radius table is still shared through the cache.
    pub fn dn_dr_direct<S, D>(
        &self,
        snr: &ArrayBase<S, D>,
        channel_width: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let channel_width = ensure_positive("channel width", channel_width)?;
        ensure_non_negative("redshift", z)?;
        let table = self.radius_table(z, params)?;
        elementwise(snr, |snr| {
            let snr = ensure_positive("snr", snr)?;
            self.cross_section_density(&table, snr, channel_width, z, params)
        })
    }

    /// Number of absorbers per unit redshift per unit log10 optical depth.
    ///
    /// Zero outside the tau grid.
    pub fn dn_dlogtau_dz<S, D>(
        &self,
        tau: &ArrayBase<S, D>,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let curve = self.dn_dlogtau_curve(z, params)?;
        elementwise(tau, |tau| {
            let tau = ensure_positive("tau", tau)?;
            Ok(self.tau_density(&curve, tau))
        })
    }

    /// Rebuild the [`dn_dlogtau_dz`](Self::dn_dlogtau_dz) curve, replacing any
    /// cached one. The radius table it reads is reused.
    pub fn rebuild_dn_dlogtau_dz(&self, z: f64, params: &ModelParams) -> Result<()> {
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::DnDlogtauDz, &[z], params);
        self.cache()
            .rebuild_curve(&key, || self.build_dn_dlogtau(z, params))?;
        Ok(())
    }

    /// Number of absorption features per unit observed (absorbed) flux in Jy,
    /// per steradian, per unit redshift, at observed fluxes `sobs`.
    ///
    /// Fluxes outside the observed-flux grid are clamped to it.
    pub fn dn_dsobs_dz<S, D>(
        &self,
        z: f64,
        sobs: &ArrayBase<S, D>,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::DnDsobsDz, &[z], params);
        let curve = self
            .cache()
            .curve(&key, || self.build_dn_dsobs(z, params))?;
        let axis = self.settings().grids.sobs;
        elementwise(sobs, |s| {
            let s = ensure_positive("observed flux", s)?;
            Ok(curve.evaluate(s.clamp(axis.min(), axis.max()).ln()))
        })
    }

    /// Ratio of the channel-convolved line width to the intrinsic one for
    /// halos of mass `m`, with channels `channel_width` Hz wide.
    pub fn rline<S, D>(
        &self,
        m: &ArrayBase<S, D>,
        z: f64,
        channel_width: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        elementwise(m, |m| self.line_ratio(&self.halo(m, z)?, channel_width, params))
    }

    /// Smallest line-centre optical depth in a halo of mass `m` detectable at
    /// signal-to-noise `snr`.
    pub fn tau_limit<S, D>(
        &self,
        snr: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        channel_width: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let rline = self.line_ratio(&self.halo(m, z)?, channel_width, params)?;
        elementwise(snr, |snr| {
            let snr = ensure_positive("snr", snr)?;
            Ok(detection_threshold(snr, rline))
        })
    }

    /// Second moment of the optical depth per comoving Mpc/h:
    /// `∫ n(m) ∫ |dsigma/dtau| (tau / rline)^2 dtau dlog10 m`.
    pub fn tau_variance(&self, z: f64, channel_width: f64, params: &ModelParams) -> Result<f64> {
        let channel_width = ensure_positive("channel width", channel_width)?;
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::TauVariance, &[z, channel_width], params);
        let per_mass = self
            .cache()
            .curve(&key, || self.build_tau_variance(z, channel_width, params))?;
        self.mass_integral(z, |halo| Ok(per_mass.evaluate(halo.mass.ln())))
    }

    /// Variance in (km/s)^2 of the line-of-sight velocity measured by stacking
    /// absorbers in a redshift bin of width `dz` centred on `z`, over
    /// `survey_area` steradians with per-channel noise `rms` Jy:
    ///
    /// `1 / (tau_variance sqrt(pi) / 2 / rms^2 * <S^2> * dr/dz * area * dz)`
    ///
    /// where `<S^2>` is the sources' flux second moment per steradian. Infinite
    /// when no absorber contributes.
    pub fn v_obs_variance(
        &self,
        z: f64,
        dz: f64,
        survey_area: f64,
        rms: f64,
        channel_width: f64,
        params: &ModelParams,
    ) -> Result<f64> {
        let dz = ensure_positive("redshift bin width", dz)?;
        let survey_area = ensure_positive("survey area", survey_area)?;
        let rms = ensure_positive("rms", rms)?;
        let tau_variance = self.tau_variance(z, channel_width, params)?;
        let flux_moment = self.sources().flux_second_moment(z)?;

        let information = tau_variance * PI.sqrt() / 2.0 / (rms * rms)
            * flux_moment
            * self.dr_dz(z)
            * survey_area
            * dz;
        if information > 0.0 {
            Ok(1.0 / information)
        } else {
            Ok(f64::INFINITY)
        }
    }

    /// Expected number of absorbers per unit redshift detected in a survey of
    /// `survey_area` steradians with per-channel noise `rms` Jy, against
    /// sources between `s_min` and `s_max` Jy.
    #[allow(clippy::too_many_arguments)]
    pub fn instrument_counts(
        &self,
        z: f64,
        survey_area: f64,
        s_min: f64,
        s_max: f64,
        channel_width: f64,
        rms: f64,
        params: &ModelParams,
    ) -> Result<f64> {
        let survey_area = ensure_non_negative("survey area", survey_area)?;
        let s_min = ensure_positive("minimum flux", s_min)?;
        let s_max = ensure_positive("maximum flux", s_max)?;
        let rms = ensure_positive("rms", rms)?;
        let curve = self.dn_dr_curve(channel_width, z, params)?;

        let snr_axis = self.settings().grids.snr;
        let lower = s_min.log10().max(rms.log10() + snr_axis.log10_min);
        let upper = s_max.log10();
        if lower >= upper {
            return Ok(0.0);
        }

        // Break at the fluxes where s / rms hits an snr node
        let negated: Vec<f64> = snr_axis.log10_nodes().iter().map(|n| -n).collect();
        let breakpoints = image_breakpoints(lower, upper, rms.log10(), &negated);
        let per_length = integrate_piecewise(
            |log10_s: f64| -> Result<f64> {
                let s = 10f64.powf(log10_s);
                Ok(self.sources().dn_dlogs_domega(s, z) * self.dn_dr_value(&curve, s / rms)?)
            },
            &breakpoints,
            &self.settings().quadrature,
        )?;
        Ok(survey_area * self.dr_dz(z) * per_length)
    }

    /// `sqrt(1 + (dv_chan / (2 sigma_line))^2)`.
    pub(crate) fn line_ratio(
        &self,
        halo: &Halo,
        channel_width: f64,
        params: &ModelParams,
    ) -> Result<f64> {
        let channel_width = ensure_positive("channel width", channel_width)?;
        let dv = channel_width * SPEED_OF_LIGHT_KMS / F21;
        let sigma = self.line_width(halo, params)?;
        Ok((1.0 + (dv / (2.0 * sigma)).powi(2)).sqrt())
    }

    /// `∫ n(m) weight(halo) dlog10 m` over the mass grid.
    fn mass_integral<F>(&self, z: f64, mut weight: F) -> Result<f64>
    where
        F: FnMut(&Halo) -> Result<f64>,
    {
        integrate_piecewise(
            |log10_m: f64| -> Result<f64> {
                let halo = self.halo(10f64.powf(log10_m), z)?;
                Ok(self.mass_function().dn_dlog10m(halo.mass, z) * weight(&halo)?)
            },
            &self.log10_mass_nodes(),
            &self.settings().quadrature,
        )
    }

    fn dn_dz_tau_curve(&self, z: f64, params: &ModelParams) -> Result<Arc<Curve1d>> {
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::DnDzTau, &[z], params);
        self.cache().curve(&key, || self.build_dn_dz_tau(z, params))
    }

    fn build_dn_dz_tau(&self, z: f64, params: &ModelParams) -> Result<Curve1d> {
        let table = self.radius_table(z, params)?;
        let axis = self.settings().grids.tau;
        let dr_dz = self.dr_dz(z);

        let mut samples = axis
            .nodes()
            .into_iter()
            .map(|tau| {
                let per_length = self.mass_integral(z, |halo| {
                    let r = self.radius_at(&table, tau, halo, Derivative::Value)?;
                    Ok(PI * r * r)
                })?;
                Ok(dr_dz * per_length)
            })
            .collect::<Result<Vec<f64>>>()?;
        enforce_non_increasing(&mut samples);
        Ok(Curve1d::fit(axis.ln_nodes(), samples)?)
    }

    fn dn_dr_curve(
        &self,
        channel_width: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Arc<Curve1d>> {
        let channel_width = ensure_positive("channel width", channel_width)?;
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::DnDr, &[z, channel_width], params);
        self.cache()
            .curve(&key, || self.build_dn_dr(channel_width, z, params))
    }

    fn build_dn_dr(&self, channel_width: f64, z: f64, params: &ModelParams) -> Result<Curve1d> {
        let table = self.radius_table(z, params)?;
        let axis = self.settings().grids.snr;

        let samples = axis
            .nodes()
            .into_iter()
            .map(|snr| self.cross_section_density(&table, snr, channel_width, z, params))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Curve1d::fit(axis.ln_nodes(), samples)?)
    }

    /// `∫ n(m) sigma(tau_limit(snr, m)) dlog10 m`.
    fn cross_section_density(
        &self,
        table: &Surface2d,
        snr: f64,
        channel_width: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<f64> {
        self.mass_integral(z, |halo| {
            let rline = self.line_ratio(halo, channel_width, params)?;
            let tau = detection_threshold(snr, rline);
            let r = self.radius_at(table, tau, halo, Derivative::Value)?;
            Ok(PI * r * r)
        })
    }

    fn dn_dr_value(&self, curve: &Curve1d, snr: f64) -> Result<f64> {
        if snr.is_nan() {
            return Err(AbsorberError::InvalidDomainInput {
                name: "snr",
                value: snr,
                reason: "must not be NaN",
            });
        }
        let axis = &self.settings().grids.snr;
        if snr < axis.min() {
            return Ok(0.0);
        }
        Ok(curve.evaluate(snr.min(axis.max()).ln()))
    }

    fn dn_dlogtau_curve(&self, z: f64, params: &ModelParams) -> Result<Arc<Curve1d>> {
        ensure_non_negative("redshift", z)?;
        let key = self.key(Quantity::DnDlogtauDz, &[z], params);
        self.cache().curve(&key, || self.build_dn_dlogtau(z, params))
    }

    fn build_dn_dlogtau(&self, z: f64, params: &ModelParams) -> Result<Curve1d> {
        let table = self.radius_table(z, params)?;
        let axis = self.settings().grids.tau;
        let dr_dz = self.dr_dz(z);

        let samples = axis
            .nodes()
            .into_iter()
            .map(|tau| {
                let slope = self.mass_integral(z, |halo| self.area_slope(&table, tau, halo))?;
                Ok(-LN_10 * tau * slope * dr_dz)
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Curve1d::fit(axis.ln_nodes(), samples)?)
    }

    /// Value of the dn/dlog10(tau)/dz curve, zero off the tau grid.
    fn tau_density(&self, curve: &Curve1d, tau: f64) -> f64 {
        if self.settings().grids.tau.contains(tau) {
            curve.evaluate(tau.ln())
        } else {
            0.0
        }
    }

    fn build_dn_dsobs(&self, z: f64, params: &ModelParams) -> Result<Curve1d> {
        let tau_curve = self.dn_dlogtau_curve(z, params)?;
        let tau_axis: LogAxis = self.settings().grids.tau;
        let sobs_axis = self.settings().grids.sobs;
        let (flux_min, flux_max) = self.sources().log10_flux_range();
        let tau_nodes = tau_axis.log10_nodes();

        let samples = sobs_axis
            .nodes()
            .into_iter()
            .map(|sobs| {
                let log10_sobs = sobs.log10();
                let lower = (log10_sobs - tau_axis.log10_max).max(flux_min);
                let upper = (log10_sobs - tau_axis.log10_min).min(flux_max);
                if lower >= upper {
                    return Ok(0.0);
                }
                let breakpoints = image_breakpoints(lower, upper, log10_sobs, &tau_nodes);
                let integral = integrate_piecewise(
                    |log10_s: f64| -> Result<f64> {
                        let s = 10f64.powf(log10_s);
                        Ok(self.sources().dn_dlogs_domega(s, z)
                            * self.tau_density(&tau_curve, sobs / s))
                    },
                    &breakpoints,
                    &self.settings().quadrature,
                )?;
                Ok(integral / (sobs * LN_10))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Curve1d::fit(sobs_axis.ln_nodes(), samples)?)
    }

    fn build_tau_variance(
        &self,
        z: f64,
        channel_width: f64,
        params: &ModelParams,
    ) -> Result<Curve1d> {
        let table = self.radius_table(z, params)?;
        let grids = &self.settings().grids;
        let ln_taus = grids.tau.ln_nodes();

        let samples = grids
            .mass
            .nodes()
            .into_iter()
            .map(|m| {
                let halo = self.halo(m, z)?;
                let rline = self.line_ratio(&halo, channel_width, params)?;
                // dtau = tau dln(tau)
                let moment = integrate_piecewise(
                    |ln_tau: f64| -> Result<f64> {
                        let tau = ln_tau.exp();
                        Ok(self.area_slope(&table, tau, &halo)?.abs() * tau.powi(3))
                    },
                    &ln_taus,
                    &self.settings().quadrature,
                )?;
                Ok(moment / (rline * rline))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Curve1d::fit(grids.mass.ln_nodes(), samples)?)
    }
}
