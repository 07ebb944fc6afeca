//! Type-safe physical units at the instrument boundary
//!
//! Instrument formulas take `uom` quantities so dish sizes, receiver
//! temperatures, channel widths and integration times cannot be mixed up.
//! The halo-model core works in plain `f64` with units documented per
//! function (comoving Mpc/h, M_sun/h, km/s, Hz).

pub use uom::si::f64::{Frequency, Length, ThermodynamicTemperature, Time};
use uom::si::frequency::{hertz, kilohertz, megahertz};
use uom::si::length::meter;
use uom::si::thermodynamic_temperature::kelvin;
use uom::si::time::{hour, second};

/// Type alias for temperature with convenient methods
pub type Temperature = ThermodynamicTemperature;

/// Extension trait for temperature conversions
pub trait TemperatureExt {
    /// Create temperature from Kelvin
    fn from_kelvin(k: f64) -> Self;

    /// Get temperature in Kelvin
    fn as_kelvin(&self) -> f64;
}

/// Extension trait for length conversions used for antenna geometry
pub trait LengthExt {
    /// Create length from meters
    fn from_meters(m: f64) -> Self;

    /// Get length in meters
    fn as_meters(&self) -> f64;
}

/// Extension trait for frequency conversions (channel widths, observing bands)
pub trait FrequencyExt {
    /// Create frequency from hertz
    fn from_hertz(hz: f64) -> Self;

    /// Create frequency from kilohertz
    fn from_kilohertz(khz: f64) -> Self;

    /// Create frequency from megahertz
    fn from_megahertz(mhz: f64) -> Self;

    /// Get frequency in hertz
    fn as_hertz(&self) -> f64;
}

/// Extension trait for integration times
pub trait TimeExt {
    /// Create time from seconds
    fn from_seconds(s: f64) -> Self;

    /// Create time from hours
    fn from_hours(h: f64) -> Self;

    /// Get time in seconds
    fn as_seconds(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_kelvin(k: f64) -> Self {
        Temperature::new::<kelvin>(k)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }
}

impl LengthExt for Length {
    fn from_meters(m: f64) -> Self {
        Length::new::<meter>(m)
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}

impl FrequencyExt for Frequency {
    fn from_hertz(hz: f64) -> Self {
        Frequency::new::<hertz>(hz)
    }

    fn from_kilohertz(khz: f64) -> Self {
        Frequency::new::<kilohertz>(khz)
    }

    fn from_megahertz(mhz: f64) -> Self {
        Frequency::new::<megahertz>(mhz)
    }

    fn as_hertz(&self) -> f64 {
        self.get::<hertz>()
    }
}

impl TimeExt for Time {
    fn from_seconds(s: f64) -> Self {
        Time::new::<second>(s)
    }

    fn from_hours(h: f64) -> Self {
        Time::new::<hour>(h)
    }

    fn as_seconds(&self) -> f64 {
        self.get::<second>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temperature_conversions() {
        let trx = Temperature::from_kelvin(30.0);
        assert_relative_eq!(trx.as_kelvin(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_frequency_conversions() {
        let channel = Frequency::from_kilohertz(10.0);
        assert_relative_eq!(channel.as_hertz(), 1e4, epsilon = 1e-6);

        let band = Frequency::from_megahertz(1420.405751768);
        assert_relative_eq!(band.as_hertz(), crate::constants::F21, max_relative = 1e-12);
    }

    #[test]
    fn test_time_conversions() {
        let t = Time::from_hours(2.0);
        assert_relative_eq!(t.as_seconds(), 7200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_length_conversions() {
        let dish = Length::from_meters(6.0);
        assert_relative_eq!(dish.as_meters(), 6.0, epsilon = 1e-12);
    }
}
