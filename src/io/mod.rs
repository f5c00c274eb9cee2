//! Reading input grids and writing results.

pub mod export;
pub mod fitfile;
pub mod ingest;

pub use export::{write_esri_ascii, write_map_csv, write_spectrum_csv, write_tanaka_csv};
pub use fitfile::{read_fit, write_fit};
pub use ingest::{grid_from_xyz, read_esri_ascii, read_xyz, resample_xyz, LoadedGrid, XyzData};
