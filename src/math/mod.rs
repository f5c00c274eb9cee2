//! Mathematical utilities: least squares and special functions.

pub mod ols;
pub mod specfn;

pub use ols::*;
pub use specfn::*;
