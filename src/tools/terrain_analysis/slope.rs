/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::f64;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::structures::KernelRadius;
use crate::tools::{compute_rows, TopoTool};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    #[default]
    Degrees,
    Percent,
}

/// Calculates slope gradient from finite differences taken `baseline` cells
/// away from each cell, along the rows and the columns:
///
/// > dz/dx = (z[c + n] - z[c - n]) / (2 n res_x)
///
/// A longer baseline smooths the result over a wider footprint, which is what
/// gives the slope layer of a topographic map its generalized look. Where one
/// side of the difference is off the grid or nodata, the one-sided difference
/// is used instead. Where both sides are missing the gradient along that axis
/// is taken as zero.
///
/// # See Also
/// `Hillshade`, `Tri`
#[derive(Debug, Clone, PartialEq)]
pub struct Slope {
    pub baseline: KernelRadius,
    pub units: SlopeUnits,
    pub z_factor: f64,
}

impl Default for Slope {
    fn default() -> Slope {
        Slope {
            baseline: KernelRadius::Cells(1),
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

impl Slope {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.z_factor.is_finite() || self.z_factor == 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "z_factor",
                value: self.z_factor,
                reason: "must be finite and non-zero",
            });
        }
        // the cell size doesn't change whether a radius is acceptable
        self.baseline.to_cells(1.0).map(|_| ())
    }
}

/// Gradient along one axis from the values `before` and `after` the centre,
/// `n` cells away, each `res` apart.
fn axis_gradient(before: Option<f64>, z: f64, after: Option<f64>, n: f64, res: f64) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) / (2.0 * n * res),
        (None, Some(a)) => (a - z) / (n * res),
        (Some(b), None) => (z - b) / (n * res),
        (None, None) => 0.0,
    }
}

impl TopoTool for Slope {
    fn get_tool_name(&self) -> String {
        "Slope".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Calculates slope gradient over a configurable baseline.".to_string()
    }

    #[tracing::instrument(skip_all, name = "slope")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        self.validate()?;
        let start = Instant::now();

        let n = self.baseline.to_cells(input.cell_size())? as isize;
        let nf = n as f64;
        let resx = input.configs.resolution_x;
        let resy = input.configs.resolution_y;
        let nodata = input.nodata();
        let columns = input.columns();
        let z_factor = self.z_factor;
        let units = self.units;

        let output = compute_rows(&input.configs, cancel, |row| {
            let mut data = vec![nodata; columns as usize];
            for col in 0..columns {
                if let Some(z) = input.get(row, col) {
                    let dzdx = axis_gradient(input.get(row, col - n), z, input.get(row, col + n), nf, resx);
                    // rows increase southward
                    let dzdy = axis_gradient(input.get(row + n, col), z, input.get(row - n, col), nf, resy);
                    let gradient = z_factor * (dzdx * dzdx + dzdy * dzdy).sqrt();
                    data[col as usize] = match units {
                        SlopeUnits::Degrees => gradient.atan().to_degrees(),
                        SlopeUnits::Percent => gradient * 100.0,
                    };
                }
            }
            data
        })?;

        tracing::debug!(
            baseline_cells = n,
            "slope done in {}",
            get_formatted_elapsed_time(start)
        );
        Ok(output)
    }
}
