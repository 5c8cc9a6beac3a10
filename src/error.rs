//! Error types for the terrain engine.
//!
//! Configuration problems are detected before any computation starts; data
//! problems are raised when the elevation grid itself can't be used. Neither
//! leaves partial output behind.

use thiserror::Error;
use topo_common::structures::ArrayDimensionError;
use topo_raster::RasterError;

/// A run configuration that can't be executed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid target resolution {0}: must be a finite, positive cell size")]
    InvalidResolution(f64),

    #[error("Invalid resampling factor {0}: must be an integer >= 1")]
    InvalidFactor(u32),

    #[error("Target resolution {target} is finer than the source resolution {source_res}; only coarsening is supported")]
    FinerThanSource { target: f64, source_res: f64 },

    #[error("Invalid kernel radius: {0}")]
    InvalidRadius(String),

    #[error("Invalid kernel sigma {0}: must be finite and positive")]
    InvalidSigma(f64),

    #[error("Donut inner radius ({inner} cells) must be smaller than its outer radius ({outer} cells)")]
    InvalidDonut { inner: usize, outer: usize },

    #[error("The adjacent kernel has no radius and can't be used for multi-scale TPI")]
    AdjacentInMultipleMode,

    #[error("Invalid number of TPI multiples {0}: must be >= 1")]
    InvalidMultiples(usize),

    #[error("{given} TPI coefficients given for {multiples} multiples")]
    TooManyCoefficients { given: usize, multiples: usize },

    #[error("Colour ramp has no stops")]
    EmptyRamp,

    #[error("Colour ramp stops must be finite and strictly ascending (stop {index} = {value})")]
    UnsortedRamp { index: usize, value: f64 },

    #[error("Unsupported band count {0}: the elevation input must have exactly one band")]
    UnsupportedBandCount(usize),

    #[error("Invalid IQR multiplier {0}: must be finite and >= 0")]
    InvalidIqrMultiplier(f64),

    #[error("Invalid Gaussian sigma {0}: must be finite and >= 0")]
    InvalidSmoothingSigma(f64),

    #[error("Invalid layer opacity {0}: must be within [0, 100]")]
    InvalidOpacity(f64),

    #[error("Invalid light source: {0}")]
    InvalidLight(String),

    #[error("Light weights don't match the lights: {0}")]
    InvalidLightWeights(String),

    #[error("Composite layer references {0}, which is not computed by this configuration")]
    MissingLayer(String),

    #[error("Invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Invalid preview window {rows}x{columns}: both dimensions must be >= 1")]
    InvalidPreview { rows: usize, columns: usize },

    #[error("Failed to parse run configuration: {0}")]
    Parse(String),

    #[error("Failed to build the worker pool: {0}")]
    ThreadPool(String),
}

/// An elevation grid that can't be processed.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("The elevation grid has no cells")]
    EmptyGrid,

    #[error("The elevation grid contains no valid (non-nodata) cells")]
    AllNodata,

    #[error("Grids {0} and {1} have different dimensions")]
    DimensionMismatch(String, String),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Dimensions(#[from] ArrayDimensionError),
}

/// Anything that stops a run.
#[derive(Debug, Error)]
pub enum TopoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<RasterError> for TopoError {
    fn from(e: RasterError) -> TopoError {
        TopoError::Data(DataError::Raster(e))
    }
}

pub type Result<T> = std::result::Result<T, TopoError>;
