//! Radio interferometer noise model for 21-cm absorption surveys.
//!
//! Converts a dish array description into the per-channel flux noise that
//! feeds [`AbsorberModel::instrument_counts`].
//!
//! # Physics Models
//!
//! - **System temperature**: `T_sys = 60 K (lambda / 1 m)^2.55 + T_rx`, the
//!   Galactic synchrotron sky plus receiver noise at the redshifted line
//! - **Effective area**: `A_eff = eta pi r^2` per dish
//! - **SEFD**: `2 k_B T_sys / A_eff`, in Jy
//! - **Channel noise**: `SEFD / sqrt(n_pol N (N - 1) t dnu)` for `N` antennas
//!
//! # Examples
//!
//! ```rust
//! use absorber_counts::instrument::models::DISH_ARRAY_6M;
//!
//! let array = DISH_ARRAY_6M.clone();
//! let rms = array.channel_rms(1.0).unwrap();
//! assert!(rms > 0.0 && rms < 1.0);
//! ```

use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::constants::{BOLTZMANN, F21, JANSKY, SPEED_OF_LIGHT};
use crate::error::{ensure_non_negative, AbsorberError, Result};
use crate::model::AbsorberModel;
use crate::params::ModelParams;
use crate::units::{
    Frequency, FrequencyExt, Length, LengthExt, Temperature, TemperatureExt, Time, TimeExt,
};

/// Sky temperature at 1 m wavelength (K)
const SKY_TEMPERATURE_1M: f64 = 60.0;

/// Spectral index of the sky temperature in wavelength
const SKY_SPECTRAL_INDEX: f64 = 2.55;

/// Interferometer array of identical dishes.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    /// Array name or identifier
    pub name: String,
    /// Dish radius
    pub dish_radius: Length,
    /// Receiver noise temperature
    pub receiver_temperature: Temperature,
    /// Aperture efficiency (0.0-1.0)
    pub aperture_efficiency: f64,
    pub n_antennas: usize,
    /// Polarizations per antenna
    pub n_pol: usize,
    /// Spectral channel width
    pub channel_width: Frequency,
    /// Total integration time per pointing
    pub integration_time: Time,
}

impl InstrumentConfig {
    /// Array with two polarizations, 50% aperture efficiency, 10 kHz channels
    /// and one hour of integration.
    pub fn new(
        name: impl Into<String>,
        dish_radius: Length,
        receiver_temperature: Temperature,
        n_antennas: usize,
    ) -> Self {
        Self {
            name: name.into(),
            dish_radius,
            receiver_temperature,
            aperture_efficiency: 0.5,
            n_antennas,
            n_pol: 2,
            channel_width: Frequency::from_kilohertz(10.0),
            integration_time: Time::from_hours(1.0),
        }
    }

    pub fn with_channel_width(mut self, channel_width: Frequency) -> Self {
        self.channel_width = channel_width;
        self
    }

    pub fn with_integration_time(mut self, integration_time: Time) -> Self {
        self.integration_time = integration_time;
        self
    }

    pub fn with_aperture_efficiency(mut self, aperture_efficiency: f64) -> Self {
        self.aperture_efficiency = aperture_efficiency;
        self
    }

    /// Check that every field is physical.
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: &str| AbsorberError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if !(self.dish_radius.as_meters() > 0.0) {
            return Err(invalid("dish_radius", "must be positive"));
        }
        if !(self.receiver_temperature.as_kelvin() >= 0.0) {
            return Err(invalid("receiver_temperature", "must be non-negative"));
        }
        if !(self.aperture_efficiency > 0.0 && self.aperture_efficiency <= 1.0) {
            return Err(invalid("aperture_efficiency", "must be in (0, 1]"));
        }
        if self.n_antennas < 2 {
            return Err(invalid("n_antennas", "an interferometer needs at least two antennas"));
        }
        if self.n_pol == 0 {
            return Err(invalid("n_pol", "must be at least one"));
        }
        if !(self.channel_width.as_hertz() > 0.0) {
            return Err(invalid("channel_width", "must be positive"));
        }
        if !(self.integration_time.as_seconds() > 0.0) {
            return Err(invalid("integration_time", "must be positive"));
        }
        Ok(())
    }

    /// Frequency of the 21-cm line emitted at redshift `z`.
    pub fn observed_frequency(&self, z: f64) -> Result<Frequency> {
        let z = ensure_non_negative("redshift", z)?;
        Ok(Frequency::from_hertz(F21 / (1.0 + z)))
    }

    /// Sky plus receiver temperature at the redshifted line.
    pub fn system_temperature(&self, z: f64) -> Result<Temperature> {
        let wavelength_m = SPEED_OF_LIGHT / self.observed_frequency(z)?.as_hertz();
        let sky = SKY_TEMPERATURE_1M * wavelength_m.powf(SKY_SPECTRAL_INDEX);
        Ok(Temperature::from_kelvin(
            sky + self.receiver_temperature.as_kelvin(),
        ))
    }

    /// Effective collecting area of one dish in m^2.
    pub fn effective_area_m2(&self) -> f64 {
        self.aperture_efficiency * PI * self.dish_radius.as_meters().powi(2)
    }

    /// System equivalent flux density of one dish in Jy.
    pub fn sefd(&self, z: f64) -> Result<f64> {
        self.validate()?;
        let tsys = self.system_temperature(z)?.as_kelvin();
        Ok(2.0 * BOLTZMANN * tsys / self.effective_area_m2() / JANSKY)
    }

    /// Image-plane noise per spectral channel in Jy/beam.
    pub fn channel_rms(&self, z: f64) -> Result<f64> {
        let sefd = self.sefd(z)?;
        let n = self.n_antennas as f64;
        let samples = self.n_pol as f64
            * n
            * (n - 1.0)
            * self.integration_time.as_seconds()
            * self.channel_width.as_hertz();
        Ok(sefd / samples.sqrt())
    }
}

impl AbsorberModel {
    /// [`instrument_counts`](Self::instrument_counts) with the channel width
    /// and per-channel noise of `instrument` at redshift `z`.
    pub fn survey_counts(
        &self,
        z: f64,
        survey_area: f64,
        s_min: f64,
        s_max: f64,
        instrument: &InstrumentConfig,
        params: &ModelParams,
    ) -> Result<f64> {
        let rms = instrument.channel_rms(z)?;
        log::debug!(
            "{}: channel rms {:.3e} Jy at z = {z}",
            instrument.name,
            rms
        );
        self.instrument_counts(
            z,
            survey_area,
            s_min,
            s_max,
            instrument.channel_width.as_hertz(),
            rms,
            params,
        )
    }
}

pub mod models {
    use super::*;

    /// Compact array of 6 m dishes with cooled receivers.
    pub static DISH_ARRAY_6M: Lazy<InstrumentConfig> = Lazy::new(|| {
        InstrumentConfig::new(
            "256 x 6m",
            Length::from_meters(3.0),
            Temperature::from_kelvin(50.0),
            256,
        )
    });

    /// Large array of 15 m dishes.
    pub static DISH_ARRAY_15M: Lazy<InstrumentConfig> = Lazy::new(|| {
        InstrumentConfig::new(
            "197 x 15m",
            Length::from_meters(7.5),
            Temperature::from_kelvin(20.0),
            197,
        )
        .with_aperture_efficiency(0.7)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn array() -> InstrumentConfig {
        InstrumentConfig::new(
            "Test",
            Length::from_meters(3.0),
            Temperature::from_kelvin(50.0),
            64,
        )
    }

    #[test]
    fn test_system_temperature() {
        let array = array();
        // 21 cm today: 60 K * 0.211^2.55 + 50 K
        let wavelength = SPEED_OF_LIGHT / F21;
        let expected = 60.0 * wavelength.powf(2.55) + 50.0;
        assert_relative_eq!(
            array.system_temperature(0.0).unwrap().as_kelvin(),
            expected,
            max_relative = 1e-12
        );
        // Sky gets brighter at longer wavelengths
        let t1 = array.system_temperature(1.0).unwrap().as_kelvin();
        let t3 = array.system_temperature(3.0).unwrap().as_kelvin();
        assert!(t3 > t1 && t1 > expected);
    }

    #[test]
    fn test_sefd() {
        let array = array();
        let tsys = array.system_temperature(1.0).unwrap().as_kelvin();
        let area = 0.5 * PI * 9.0;
        assert_relative_eq!(array.effective_area_m2(), area, max_relative = 1e-14);
        assert_relative_eq!(
            array.sefd(1.0).unwrap(),
            2.0 * 1.380_649e-23 * tsys / area / 1e-26,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_channel_rms_scaling() {
        let array = array();
        let base = array.channel_rms(1.0).unwrap();

        let longer = array
            .clone()
            .with_integration_time(Time::from_hours(4.0))
            .channel_rms(1.0)
            .unwrap();
        assert_relative_eq!(longer, base / 2.0, max_relative = 1e-12);

        let wider = array
            .clone()
            .with_channel_width(Frequency::from_kilohertz(40.0))
            .channel_rms(1.0)
            .unwrap();
        assert_relative_eq!(wider, base / 2.0, max_relative = 1e-12);

        let expected = array.sefd(1.0).unwrap() / (2.0 * 64.0 * 63.0 * 3600.0 * 1e4f64).sqrt();
        assert_relative_eq!(base, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_validation() {
        let mut single = array();
        single.n_antennas = 1;
        assert!(matches!(
            single.channel_rms(1.0),
            Err(AbsorberError::InvalidParameter { .. })
        ));

        let lossy = array().with_aperture_efficiency(0.0);
        assert!(lossy.sefd(1.0).is_err());

        assert!(array().observed_frequency(-1.0).unwrap_err().is_domain_error());
    }

    #[test]
    fn test_models() {
        for model in [&*models::DISH_ARRAY_6M, &*models::DISH_ARRAY_15M] {
            model.validate().unwrap();
            assert!(model.channel_rms(0.5).unwrap() > 0.0);
        }
        // Bigger dishes, fewer of them, still more sensitive per channel
        assert!(
            models::DISH_ARRAY_15M.channel_rms(1.0).unwrap()
                < models::DISH_ARRAY_6M.channel_rms(1.0).unwrap()
        );
    }
}
