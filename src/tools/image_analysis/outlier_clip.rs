/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::tools::{compute_rows, TopoTool};

/// Clamps the valid cells of a grid to the Tukey fences
/// `[Q1 - k IQR, Q3 + k IQR]`. With the valid values sorted as `x[0..n]`, the
/// quartiles are the order statistics `Q1 = x[floor(0.25 (n - 1))]` and
/// `Q3 = x[ceil(0.75 (n - 1))]`. Because both quartiles lie inside the fences,
/// clipping leaves them in place and a second clip changes nothing.
///
/// The grid is returned unchanged when the IQR is zero or when there are no
/// valid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierClip {
    pub iqr_multiplier: f64,
}

impl Default for OutlierClip {
    fn default() -> OutlierClip {
        OutlierClip { iqr_multiplier: 1.5 }
    }
}

/// Lower and upper quartile of `values` by the order-statistic rule above.
pub fn quartiles(values: &mut [f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let last = (values.len() - 1) as f64;
    let q1 = values[(0.25 * last).floor() as usize];
    let q3 = values[(0.75 * last).ceil() as usize];
    Some((q1, q3))
}

impl OutlierClip {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigError::InvalidIqrMultiplier(self.iqr_multiplier));
        }
        Ok(())
    }

    /// The fences for `input`, or `None` when the clip would be skipped.
    pub fn fences(&self, input: &Grid) -> Option<(f64, f64)> {
        let (q1, q3) = quartiles(&mut input.valid_values())?;
        let iqr = q3 - q1;
        if iqr <= 0.0 {
            return None;
        }
        Some((q1 - self.iqr_multiplier * iqr, q3 + self.iqr_multiplier * iqr))
    }
}

impl TopoTool for OutlierClip {
    fn get_tool_name(&self) -> String {
        "OutlierClip".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Clamps grid values to the interquartile-range fences.".to_string()
    }

    #[tracing::instrument(skip_all, name = "outlier_clip")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        self.validate()?;
        let (lower, upper) = match self.fences(input) {
            Some(f) => f,
            None => {
                tracing::debug!("IQR is zero, clip skipped");
                return Ok(input.clone());
            }
        };
        tracing::debug!(lower, upper, "clipping outliers");
        compute_rows(&input.configs, cancel, |row| {
            input
                .get_row_data(row)
                .into_iter()
                .map(|z| if input.is_nodata(z) { z } else { z.clamp(lower, upper) })
                .collect()
        })
    }
}
