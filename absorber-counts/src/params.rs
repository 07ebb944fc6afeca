//! Named model parameters and their canonical (hashable) form.
//!
//! A [`ModelParams`] is the set of scalar knobs that select and shape the
//! HI/spin-temperature model for one calculation. Entries are kept sorted by
//! name, so two parameter sets built from the same pairs in any insertion
//! order compare equal and canonicalize to the same cache key.
//!
//! # Example
//!
//! ```
//! use absorber_counts::params::ModelParams;
//!
//! let a = ModelParams::new()
//!     .with("profile_model", "exponential")
//!     .with("peak_velocity_fraction", 0.8);
//! let b = ModelParams::new()
//!     .with("peak_velocity_fraction", 0.8)
//!     .with("profile_model", "exponential");
//! assert_eq!(a.canonical(), b.canonical());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AbsorberError, Result};

/// Parameter selecting the radial HI/spin-temperature family.
pub const PROFILE_MODEL: &str = "profile_model";

/// Parameter setting the W90 line width as a fraction of the virial velocity.
pub const PEAK_VELOCITY_FRACTION: &str = "peak_velocity_fraction";

/// Profile family used when `profile_model` is not given.
pub const DEFAULT_PROFILE_MODEL: &str = "exponential";

/// Line width fraction used when `peak_velocity_fraction` is not given.
pub const DEFAULT_PEAK_VELOCITY_FRACTION: f64 = 1.0;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Hashable form of a [`ParamValue`]; numbers are compared bitwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalValue {
    Number(u64),
    Text(String),
}

/// Canonical, immutable form of a parameter set: entries sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalParams(Vec<(String, CanonicalValue)>);

impl CanonicalParams {
    /// Sorted entries.
    pub fn entries(&self) -> &[(String, CanonicalValue)] {
        &self.0
    }
}

/// Bit pattern used to compare floating point covariates and parameters;
/// `-0.0` is folded onto `0.0`.
pub(crate) fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(BTreeMap<String, ParamValue>);

impl ModelParams {
    /// Empty parameter set; every knob takes its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Number of explicitly set entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no entry is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Numeric value, or `default` when absent.
    ///
    /// Fails when the entry holds text or a non-finite number.
    pub fn number_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Number(v)) if v.is_finite() => Ok(*v),
            Some(ParamValue::Number(v)) => Err(AbsorberError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{v} is not finite"),
            }),
            Some(ParamValue::Text(s)) => Err(AbsorberError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a number, found text '{s}'"),
            }),
        }
    }

    /// Numeric value that must be strictly positive, or `default` when absent.
    pub fn positive_or(&self, name: &str, default: f64) -> Result<f64> {
        let value = self.number_or(name, default)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(AbsorberError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{value} must be positive"),
            })
        }
    }

    /// Text value, or `default` when absent.
    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(s)) => Ok(s.as_str()),
            Some(ParamValue::Number(v)) => Err(AbsorberError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected text, found number {v}"),
            }),
        }
    }

    /// Selected profile family name.
    pub fn profile_model(&self) -> Result<&str> {
        self.text_or(PROFILE_MODEL, DEFAULT_PROFILE_MODEL)
    }

    /// W90 line width as a fraction of the virial velocity.
    pub fn peak_velocity_fraction(&self) -> Result<f64> {
        self.positive_or(PEAK_VELOCITY_FRACTION, DEFAULT_PEAK_VELOCITY_FRACTION)
    }

    /// Canonical form used in cache keys.
    pub fn canonical(&self) -> CanonicalParams {
        CanonicalParams(
            self.0
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        ParamValue::Number(v) => CanonicalValue::Number(canonical_bits(*v)),
                        ParamValue::Text(s) => CanonicalValue::Text(s.clone()),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }

    /// Parse a JSON object of name/value pairs.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<K, V> FromIterator<(K, V)> for ModelParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", entries.join(", "))
    }
}
