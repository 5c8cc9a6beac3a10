/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::time::Instant;

use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::tools::{compute_rows, TopoTool};

/// This tool performs a Gaussian filter on a grid, smoothing it by convolving
/// each cell and its neighbours with weights from the normal curve. The standard
/// deviation (`sigma`) is in units of grid cells and the kernel extends
/// `ceil(3 sigma)` cells from the centre. The filter is applied as a horizontal
/// pass followed by a vertical pass.
///
/// NoData cells are ignored: the weights of each window are normalized over its
/// valid cells, and cells that are NoData in the input stay NoData. A sigma of
/// zero returns the input unchanged.
///
/// # See Also
/// `OutlierClip`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFilter {
    pub sigma: f64,
}

impl GaussianFilter {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(ConfigError::InvalidSmoothingSigma(self.sigma));
        }
        Ok(())
    }

    /// One-sided extent of the kernel, in cells.
    pub fn radius(&self) -> usize {
        (3.0 * self.sigma).ceil() as usize
    }

    fn weights(&self) -> Vec<f64> {
        let r = self.radius() as isize;
        let two_sigma_sqr = 2.0 * self.sigma * self.sigma;
        (-r..=r)
            .map(|k| (-((k * k) as f64) / two_sigma_sqr).exp())
            .collect()
    }

    fn pass(&self, input: &Grid, weights: &[f64], horizontal: bool, cancel: &CancelToken) -> Result<Grid> {
        let r = self.radius() as isize;
        let nodata = input.nodata();
        let columns = input.columns();
        compute_rows(&input.configs, cancel, |row| {
            let mut data = vec![nodata; columns as usize];
            for col in 0..columns {
                if input.get(row, col).is_none() {
                    continue;
                }
                let mut sum = 0.0;
                let mut total = 0.0;
                for (k, w) in (-r..=r).zip(weights) {
                    let z = if horizontal {
                        input.get(row, col + k)
                    } else {
                        input.get(row + k, col)
                    };
                    if let Some(z) = z {
                        sum += w * z;
                        total += w;
                    }
                }
                if total > 0.0 {
                    data[col as usize] = sum / total;
                }
            }
            data
        })
    }
}

impl TopoTool for GaussianFilter {
    fn get_tool_name(&self) -> String {
        "GaussianFilter".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Performs a Gaussian filter on a grid.".to_string()
    }

    #[tracing::instrument(skip_all, name = "gaussian_filter")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        self.validate()?;
        if self.sigma == 0.0 || self.radius() == 0 {
            return Ok(input.clone());
        }
        let start = Instant::now();
        let weights = self.weights();
        let horizontal = self.pass(input, &weights, true, cancel)?;
        let output = self.pass(&horizontal, &weights, false, cancel)?;
        tracing::debug!(
            sigma = self.sigma,
            "gaussian filter done in {}",
            get_formatted_elapsed_time(start)
        );
        Ok(output)
    }
}
