//! Synthetic test data.

mod synth;

pub use synth::{synthetic_grid, SynthConfig};
