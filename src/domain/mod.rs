//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`Taper`, `MethodSpec`, `Crs`)
//! - binned spectra (`RadialSpectrum`, `AzimuthalSpectrum`)
//! - inversion configuration (`Priors`, `ParamBounds`, `InversionConfig`)
//! - fit outputs (`BouligandFit`, `TanakaFit`, `McmcSummary`, etc.)

pub mod types;

pub use types::*;
