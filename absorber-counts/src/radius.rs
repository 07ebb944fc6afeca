//! Radius within which a halo's line-centre optical depth exceeds a threshold.
//!
//! For each node of the mass grid the line-centre optical depth is integrated
//! directly on a log-spaced set of radii out to the virial radius and inverted
//! to a radius ratio `r / r_vir` on the canonical tau grid. The inverted rows
//! form a surface over (ln m, ln tau); [`AbsorberModel::r_tau`] scales it back
//! by the virial radius.

use std::sync::Arc;

use halo_math::{interp, Surface2d};
use ndarray::{Array, Array2, ArrayBase, Data, Dimension};

use crate::cache::Quantity;
use crate::error::{ensure_positive, AbsorberError, Result};
use crate::model::{elementwise, AbsorberModel};
use crate::params::ModelParams;
use crate::profiles::Halo;

/// Relative rise between neighbouring samples accepted as quadrature noise.
const MONOTONE_TOLERANCE: f64 = 1e-6;

/// Which quantity a radius query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Derivative {
    /// The radius itself
    #[default]
    Value,
    /// Its derivative with respect to the threshold
    First,
}

impl AbsorberModel {
    /// Comoving radius (Mpc/h) inside which every sightline through a halo of
    /// mass `m` has line-centre optical depth above `tau`, or its derivative
    /// with respect to `tau`.
    ///
    /// Thresholds above the tau grid give zero (value and slope). Thresholds
    /// below the grid are clamped to its minimum with zero slope. Masses are
    /// clamped to the mass grid.
    pub fn r_tau<S, D>(
        &self,
        tau: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
        derivative: Derivative,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let halo = self.halo(m, z)?;
        let table = self.radius_table(z, params)?;
        elementwise(tau, |tau| self.radius_at(&table, tau, &halo, derivative))
    }

    /// Rebuild the radius table for `(z, params)`, replacing any cached one.
    pub fn rebuild_radius_table(&self, z: f64, params: &ModelParams) -> Result<()> {
        let key = self.key(Quantity::RadiusTau, &[z], params);
        self.cache()
            .rebuild_surface(&key, || self.build_radius_table(z, params))?;
        Ok(())
    }

    pub(crate) fn radius_table(&self, z: f64, params: &ModelParams) -> Result<Arc<Surface2d>> {
        let key = self.key(Quantity::RadiusTau, &[z], params);
        self.cache()
            .surface(&key, || self.build_radius_table(z, params))
    }

    /// Radius (or slope) for one threshold from an already fetched table.
    pub(crate) fn radius_at(
        &self,
        table: &Surface2d,
        tau: f64,
        halo: &Halo,
        derivative: Derivative,
    ) -> Result<f64> {
        let tau = ensure_positive("tau", tau)?;
        let axis = &self.settings().grids.tau;
        if tau > axis.max() {
            return Ok(0.0);
        }
        let below_grid = tau < axis.min();
        let tau = tau.max(axis.min());

        let ln_m = self.clamp_mass(halo.mass).ln();
        let rv = halo.virial_radius;
        Ok(match derivative {
            Derivative::Value => table.evaluate(ln_m, tau.ln()) * rv,
            Derivative::First if below_grid => 0.0,
            Derivative::First => table.derivative_y(ln_m, tau.ln()) / tau * rv,
        })
    }

    fn build_radius_table(&self, z: f64, params: &ModelParams) -> Result<Surface2d> {
        let grids = &self.settings().grids;
        let ratio_axis = grids.inversion_radius_axis();
        let ratios = ratio_axis.nodes();
        let tau_nodes = grids.tau.nodes();
        let masses = grids.mass.nodes();

        let mut values = Array2::zeros((masses.len(), tau_nodes.len()));
        for (i, &m) in masses.iter().enumerate() {
            let halo = self.halo(m, z)?;
            let profile = self.halo_profile(&halo, params)?;
            let sigma = self.line_width(&halo, params)?;

            let mut taus = ratios
                .iter()
                .map(|ratio| {
                    self.direct_peak_tau(ratio * halo.virial_radius, &halo, profile.as_ref(), sigma)
                })
                .collect::<Result<Vec<f64>>>()?;
            flatten_noise(&mut taus).ok_or(AbsorberError::NonMonotonicProfile {
                mass: m,
                redshift: z,
            })?;

            let row = invert_row(&ratios, &taus, &tau_nodes)?;
            for (j, ratio) in row.into_iter().enumerate() {
                values[[i, j]] = ratio;
            }
        }

        Ok(Surface2d::new(grids.mass.ln_nodes(), grids.tau.ln_nodes(), values)?)
    }
}

/// Level out outward rises in `taus` that are within quadrature noise.
///
/// Returns `None` when a rise exceeds the tolerance.
fn flatten_noise(taus: &mut [f64]) -> Option<()> {
    let mut flattened = 0;
    for j in 1..taus.len() {
        let inner = taus[j - 1];
        if taus[j] > inner {
            if taus[j] - inner > MONOTONE_TOLERANCE * inner.abs() {
                return None;
            }
            taus[j] = inner;
            flattened += 1;
        }
    }
    if flattened > 0 {
        log::debug!("Flattened {flattened} optical depth samples within noise");
    }
    Some(())
}

/// Invert one non-increasing optical depth row to radius ratios at `tau_nodes`.
///
/// Log-log linear between positive samples, linear in tau from the outermost
/// positive sample down to zero at the virial radius, zero above the
/// innermost sample.
fn invert_row(ratios: &[f64], taus: &[f64], tau_nodes: &[f64]) -> Result<Vec<f64>> {
    // Strictly ascending ln tau, keeping the outermost radius of any flat run
    let mut ln_tau: Vec<f64> = Vec::with_capacity(taus.len());
    let mut ln_ratio: Vec<f64> = Vec::with_capacity(taus.len());
    for (&ratio, &tau) in ratios.iter().zip(taus).rev() {
        if tau > 0.0 && ln_tau.last().map_or(true, |&last| tau.ln() > last) {
            ln_tau.push(tau.ln());
            ln_ratio.push(ratio.ln());
        }
    }

    let Some((&outer_ln_tau, &outer_ln_ratio)) = ln_tau.first().zip(ln_ratio.first()) else {
        return Ok(vec![0.0; tau_nodes.len()]);
    };
    let central = ln_tau[ln_tau.len() - 1];

    tau_nodes
        .iter()
        .map(|&t| {
            let ln_t = t.ln();
            if ln_t > central {
                Ok(0.0)
            } else if ln_t >= outer_ln_tau {
                if ln_tau.len() == 1 {
                    Ok(outer_ln_ratio.exp())
                } else {
                    Ok(interp(ln_t, &ln_tau, &ln_ratio)?.exp())
                }
            } else {
                let outer_ratio = outer_ln_ratio.exp();
                let outer_tau = outer_ln_tau.exp();
                Ok(outer_ratio + (1.0 - t / outer_tau) * (1.0 - outer_ratio))
            }
        })
        .collect()
}
