//! Terminal plotting.

pub mod ascii;

pub use ascii::{render_fit_file_plot, render_spectrum_plot};
