//! Derives topographic visualization rasters (slope, topographic position
//! index, terrain ruggedness index and hillshade) from a single-band
//! elevation grid and composites them into styled RGBA maps.
//!
//! The engine works on in-memory `topo_raster::Grid`s and does no file I/O;
//! `pipeline::run` drives a whole `config::TerrainConfig`, while the tools
//! under `tools` can be used on their own.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod rendering;
pub mod sampling;
pub mod structures;
pub mod tools;

pub use topo_raster::{Grid, GridConfigs};
