//! Background radio source populations.
//!
//! Absorbers are only seen against a background continuum source, so every
//! observable count is convolved with the source counts. A population
//! supplies its differential counts per log10 flux and per steradian, and
//! the flux range over which those counts are meaningful.

use std::f64::consts::{LN_10, PI};

use halo_math::{integrate, QuadratureConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AbsorberError, Result};

/// Differential counts of background continuum sources.
pub trait SourcePopulation: Send + Sync {
    /// dN / dlog10 S / dOmega at flux `s` (Jy) for sources behind redshift `z`,
    /// per steradian.
    fn dn_dlogs_domega(&self, s: f64, z: f64) -> f64;

    /// (min, max) of log10 flux in Jy over which the counts are defined.
    fn log10_flux_range(&self) -> (f64, f64);

    /// `∫ S^2 dN/dlog10 S dlog10 S` over the flux range, in Jy^2 sr^-1.
    fn flux_second_moment(&self, z: f64) -> Result<f64> {
        let (lower, upper) = self.log10_flux_range();
        integrate(
            |log10_s: f64| {
                let s = 10f64.powf(log10_s);
                Ok::<_, AbsorberError>(s * s * self.dn_dlogs_domega(s, z))
            },
            lower,
            upper,
            &QuadratureConfig::default(),
        )
    }
}

/// Euclidean-style power-law counts `dN/dS = k (S / s0)^gamma` per steradian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawSources {
    /// Normalization in Jy^-1 sr^-1
    pub k: f64,
    /// Reference flux in Jy
    pub s0: f64,
    /// Power-law index (negative)
    pub gamma: f64,
    pub log10_flux_min: f64,
    pub log10_flux_max: f64,
}

impl Default for PowerLawSources {
    fn default() -> Self {
        Self {
            k: 3000.0,
            s0: 0.88,
            gamma: -1.75,
            log10_flux_min: -4.0,
            log10_flux_max: 1.0,
        }
    }
}

impl PowerLawSources {
    /// dN/dS in Jy^-1 sr^-1.
    pub fn differential_counts(&self, s: f64) -> f64 {
        self.k * (s / self.s0).powf(self.gamma)
    }

    /// Flux variance per steradian, `∫ S^2 dN/dS dS` from `s_min` to `s_max`,
    /// in Jy^2 sr^-1.
    pub fn flux_variance(&self, s_min: f64, s_max: f64) -> Result<f64> {
        let p = 3.0 + self.gamma;
        if p <= 0.0 {
            return Err(AbsorberError::InvalidParameter {
                name: "gamma".into(),
                reason: format!("flux variance diverges at low flux for gamma = {}", self.gamma),
            });
        }
        let norm = self.k * self.s0.powf(-self.gamma) / p;
        Ok(norm * (s_max.powf(p) - s_min.max(0.0).powf(p)))
    }

    /// Flux at which unresolved sources in a Gaussian beam of width
    /// `beam_sigma` (radians) reach `nsigma` times their own rms.
    ///
    /// Solves `S_c = nsigma * sigma_c(S_c)` with
    /// `sigma_c^2 = ∫_0^S_c S^2 dN/dS Omega_eff dS` and the power-law effective
    /// beam `Omega_eff = 2 pi beam_sigma^2 / (-gamma - 1)`.
    pub fn confusion_limit(&self, beam_sigma: f64, nsigma: f64) -> Result<f64> {
        let beta = -self.gamma;
        if !(beta > 1.0 && beta < 3.0) {
            return Err(AbsorberError::InvalidParameter {
                name: "gamma".into(),
                reason: format!("confusion limit requires -3 < gamma < -1, got {}", self.gamma),
            });
        }
        let omega_eff = 2.0 * PI * beam_sigma * beam_sigma / (beta - 1.0);
        let a = self.k * self.s0.powf(beta) * omega_eff / (3.0 - beta);
        Ok((nsigma * nsigma * a).powf(1.0 / (beta - 1.0)))
    }
}

impl SourcePopulation for PowerLawSources {
    fn dn_dlogs_domega(&self, s: f64, _z: f64) -> f64 {
        LN_10 * s * self.differential_counts(s)
    }

    fn log10_flux_range(&self) -> (f64, f64) {
        (self.log10_flux_min, self.log10_flux_max)
    }

    fn flux_second_moment(&self, _z: f64) -> Result<f64> {
        self.flux_variance(10f64.powf(self.log10_flux_min), 10f64.powf(self.log10_flux_max))
    }
}
