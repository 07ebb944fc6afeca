//! Cross-section of a halo above an optical depth threshold.

use std::f64::consts::PI;

use halo_math::Surface2d;
use ndarray::{Array, ArrayBase, Data, Dimension};

use crate::error::Result;
use crate::model::{elementwise, AbsorberModel};
use crate::params::ModelParams;
use crate::profiles::Halo;
use crate::radius::Derivative;

impl AbsorberModel {
    /// Area `pi r_tau^2` in comoving (Mpc/h)^2 over which a halo of mass `m`
    /// shows line-centre optical depth above `tau`.
    pub fn sigma_tau<S, D>(
        &self,
        tau: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let radius = self.r_tau(tau, m, z, params, Derivative::Value)?;
        Ok(radius.mapv(|r| PI * r * r))
    }

    /// Derivative of [`sigma_tau`](Self::sigma_tau) with respect to `tau`;
    /// never positive.
    pub fn dsigma_dtau<S, D>(
        &self,
        tau: &ArrayBase<S, D>,
        m: f64,
        z: f64,
        params: &ModelParams,
    ) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let halo = self.halo(m, z)?;
        let table = self.radius_table(z, params)?;
        elementwise(tau, |tau| self.area_slope(&table, tau, &halo))
    }

    /// `2 pi r dr/dtau` from an already fetched radius table.
    pub(crate) fn area_slope(&self, table: &Surface2d, tau: f64, halo: &Halo) -> Result<f64> {
        let r = self.radius_at(table, tau, halo, Derivative::Value)?;
        let dr = self.radius_at(table, tau, halo, Derivative::First)?;
        Ok(2.0 * PI * r * dr)
    }
}
