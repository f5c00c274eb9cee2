//! Formatted terminal output.

pub mod format;

pub use format::{
    format_fit_summary, format_grid_summary, format_map_summary, format_tanaka_map_summary,
};
