//! `curie-depth` library crate.
//!
//! The binary (`curie`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., notebooks, future services)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod grid;
pub mod io;
pub mod mapping;
pub mod math;
pub mod models;
pub mod optimise;
pub mod parallel;
pub mod plot;
pub mod report;
pub mod spectrum;
