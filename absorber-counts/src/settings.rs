//! Table resolutions and numerical tolerances.
//!
//! Every lazily built table samples its axes from [`GridSettings`]; every
//! integral uses the tolerances in [`QuadratureConfig`]. Both are plain serde
//! structs so a forecast can be configured from JSON alongside its
//! [`ModelParams`](crate::params::ModelParams).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use halo_math::{LogAxis, QuadratureConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AbsorberError, Result};

/// Sample axes for the interpolation tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Halo mass in M_sun/h; also the range of every mass integral
    pub mass: LogAxis,
    /// log10 of the innermost radius-to-virial-radius ratio in the profile table
    pub radius_ratio_log10_min: f64,
    /// Radius-ratio nodes in the profile table (outermost node is the virial radius)
    pub profile_radius_points: usize,
    /// Radius-ratio nodes used when inverting tau per mass row
    pub inversion_radius_points: usize,
    /// Optical depth thresholds
    pub tau: LogAxis,
    /// Detection signal-to-noise thresholds
    pub snr: LogAxis,
    /// Observed (absorbed) flux in Jy
    pub sobs: LogAxis,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            mass: LogAxis::new(8.0, 15.0, 64),
            radius_ratio_log10_min: -3.0,
            profile_radius_points: 100,
            inversion_radius_points: 200,
            tau: LogAxis::new(-6.0, 1.0, 100),
            snr: LogAxis::new(0.0, 4.0, 64),
            sobs: LogAxis::new(-6.0, 1.0, 64),
        }
    }
}

impl GridSettings {
    /// Low resolution grids for quick forecasts and tests.
    pub fn coarse() -> Self {
        Self {
            mass: LogAxis::new(9.0, 14.0, 11),
            radius_ratio_log10_min: -3.0,
            profile_radius_points: 40,
            inversion_radius_points: 120,
            tau: LogAxis::new(-5.0, 1.0, 49),
            snr: LogAxis::new(0.0, 3.0, 25),
            sobs: LogAxis::new(-5.0, 0.0, 21),
        }
    }

    /// Check every axis and the radius-ratio table bounds.
    pub fn validate(&self) -> Result<()> {
        for (name, axis) in [
            ("grids.mass", &self.mass),
            ("grids.tau", &self.tau),
            ("grids.snr", &self.snr),
            ("grids.sobs", &self.sobs),
        ] {
            axis.validate().map_err(|e| invalid(name, e))?;
        }
        if !(self.radius_ratio_log10_min.is_finite() && self.radius_ratio_log10_min < 0.0) {
            return Err(invalid(
                "grids.radius_ratio_log10_min",
                format!("{} must be negative", self.radius_ratio_log10_min),
            ));
        }
        for (name, points) in [
            ("grids.profile_radius_points", self.profile_radius_points),
            ("grids.inversion_radius_points", self.inversion_radius_points),
        ] {
            if points < 2 {
                return Err(invalid(name, format!("{points} is fewer than 2 points")));
            }
        }
        Ok(())
    }

    /// Radius-to-virial-radius ratios of the profile table, innermost first.
    pub fn profile_radius_axis(&self) -> LogAxis {
        LogAxis::new(self.radius_ratio_log10_min, 0.0, self.profile_radius_points)
    }

    /// Radius-to-virial-radius ratios sampled when inverting a mass row.
    pub fn inversion_radius_axis(&self) -> LogAxis {
        LogAxis::new(self.radius_ratio_log10_min, 0.0, self.inversion_radius_points)
    }
}

/// Grids plus quadrature tolerances for one model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub grids: GridSettings,
    pub quadrature: QuadratureConfig,
}

impl ModelSettings {
    /// Coarse grids with default tolerances.
    pub fn coarse() -> Self {
        Self {
            grids: GridSettings::coarse(),
            quadrature: QuadratureConfig {
                rel_tolerance: 1e-7,
                ..QuadratureConfig::default()
            },
        }
    }

    /// Parse and validate settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check grids and tolerances.
    pub fn validate(&self) -> Result<()> {
        self.grids.validate()?;
        let q = &self.quadrature;
        if !(q.rel_tolerance >= 0.0 && q.abs_tolerance >= 0.0) {
            return Err(invalid("quadrature", "tolerances must be non-negative"));
        }
        if q.rel_tolerance == 0.0 && q.abs_tolerance == 0.0 {
            return Err(invalid("quadrature", "at least one tolerance must be positive"));
        }
        if q.max_intervals == 0 {
            return Err(invalid("quadrature.max_intervals", "must be at least 1"));
        }
        Ok(())
    }

    /// Hash of every grid and tolerance value.
    ///
    /// Tables built under different settings never share a cache entry.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let g = &self.grids;
        for axis in [g.mass, g.tau, g.snr, g.sobs] {
            hash_axis(&axis, &mut hasher);
        }
        g.radius_ratio_log10_min.to_bits().hash(&mut hasher);
        g.profile_radius_points.hash(&mut hasher);
        g.inversion_radius_points.hash(&mut hasher);
        self.quadrature.abs_tolerance.to_bits().hash(&mut hasher);
        self.quadrature.rel_tolerance.to_bits().hash(&mut hasher);
        self.quadrature.max_intervals.hash(&mut hasher);
        hasher.finish()
    }
}

fn invalid(name: &str, reason: impl ToString) -> AbsorberError {
    AbsorberError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn hash_axis(axis: &LogAxis, hasher: &mut DefaultHasher) {
    axis.log10_min.to_bits().hash(hasher);
    axis.log10_max.to_bits().hash(hasher);
    axis.points.hash(hasher);
}
