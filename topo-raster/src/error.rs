//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when building, reading or writing grids.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header or data line could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A required header entry is missing.
    #[error("Missing header entry: {0}")]
    MissingHeader(&'static str),

    /// The number of values doesn't match the declared dimensions.
    #[error("Invalid grid dimensions: expected {rows}x{columns} = {expected} values, found {found}")]
    InvalidDimensions {
        rows: usize,
        columns: usize,
        expected: usize,
        found: usize,
    },

    /// rows x columns does not fit in memory addressing.
    #[error("Grid of {rows}x{columns} cells is too large")]
    TooManyCells { rows: usize, columns: usize },

    /// Cell size is not a positive, finite number.
    #[error("Invalid cell size: {0}")]
    InvalidCellSize(f64),

    /// A sub-window that falls outside of the grid.
    #[error("Window {rows}x{columns} at ({row}, {column}) is outside of the grid")]
    WindowOutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
}
