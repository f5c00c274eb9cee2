//! Published radial power-spectrum models for depth to magnetic sources.
//!
//! - `bouligand2009`: analytic spectrum of a fractally magnetised layer
//! - `maus1995`: fractal half-space slope model
//! - `tanaka1999` / `compute_tanaka`: two-band centroid method

pub mod bouligand;
pub mod maus;
pub mod tanaka;

pub use bouligand::*;
pub use maus::*;
pub use tanaka::*;
