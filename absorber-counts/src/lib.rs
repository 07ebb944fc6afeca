//! absorber-counts - Halo-model forecasts for intervening 21-cm absorbers
//!
//! This crate predicts how many HI 21-cm absorption features a radio survey
//! should find against background continuum sources:
//!
//! - **Profile** - line-of-sight optical depth through a halo's HI distribution
//! - **Radius** - impact radius at which a halo reaches a given optical depth
//! - **Area** - absorbing cross-section above an optical depth threshold
//! - **Statistics** - absorber counts per unit redshift, optical depth,
//!   signal-to-noise and observed flux, weighted by the halo mass function
//! - **Instrument** - dish array noise for survey forecasts
//!
//! Every table the pipeline needs is built lazily on first use and shared
//! through an [`InterpolationCache`].
//!
//! # Example
//!
//! ```no_run
//! use absorber_counts::{AbsorberModel, ModelParams, ModelSettings};
//! use ndarray::array;
//!
//! let model = AbsorberModel::reference().with_settings(ModelSettings::coarse()).unwrap();
//! let params = ModelParams::new().with("profile_model", "cored_isothermal");
//!
//! // Absorbers per unit redshift deeper than each optical depth
//! let counts = model.dn_dz_tau(&array![1e-3, 1e-2, 1e-1], 1.0, &params).unwrap();
//! println!("dN/dz(>tau) = {counts}");
//! ```

pub mod area;
pub mod cache;
pub mod constants;
pub mod cosmology;
pub mod error;
pub mod instrument;
pub mod mass_function;
pub mod model;
pub mod params;
pub mod profile;
pub mod profiles;
pub mod radius;
pub mod settings;
pub mod sources;
pub mod statistics;
pub mod units;

// Re-export commonly used types
pub use cache::{CacheKey, InterpolationCache, Quantity};
pub use cosmology::{Cosmology, FlatLcdm, HaloStructure, VirialRelations};
pub use error::{AbsorberError, Result};
pub use instrument::InstrumentConfig;
pub use mass_function::{MassFunction, PowerLawMassFunction};
pub use model::AbsorberModel;
pub use params::{ModelParams, ParamValue};
pub use profile::{LineOffset, LineQuery, ProfileLookup};
pub use profiles::{Halo, HaloProfile, ProfileFamily, ProfileRegistry};
pub use radius::Derivative;
pub use settings::{GridSettings, ModelSettings};
pub use sources::{PowerLawSources, SourcePopulation};
