/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::time::Instant;

use serde::{Deserialize, Serialize};
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::structures::{Kernel, KernelSpec};
use crate::tools::{compute_rows, TopoTool};

/// How the neighbourhood mean is taken.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TpiMode {
    /// One kernel.
    Single(KernelSpec),
    /// `multiples` kernels of radius `d, 2d, ..., m d` built from `base`. The
    /// result is `sum(c_k * tpi_k)`; coefficients that aren't given default
    /// to `1 / multiples`.
    Multiple {
        base: KernelSpec,
        multiples: usize,
        #[serde(default)]
        coefficients: Vec<f64>,
    },
}

impl Default for TpiMode {
    fn default() -> TpiMode {
        TpiMode::Single(KernelSpec::default())
    }
}

/// Topographic position index: the difference between a cell's elevation and
/// the weighted mean elevation of its neighbourhood. Positive values mark
/// ridges and hilltops, negative values valleys and hollows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tpi {
    pub mode: TpiMode,
}

impl Tpi {
    /// The kernel specs and their coefficients.
    fn terms(&self) -> std::result::Result<Vec<(KernelSpec, f64)>, ConfigError> {
        match &self.mode {
            TpiMode::Single(spec) => Ok(vec![(spec.clone(), 1.0)]),
            TpiMode::Multiple {
                base,
                multiples,
                coefficients,
            } => {
                let m = *multiples;
                if m == 0 {
                    return Err(ConfigError::InvalidMultiples(m));
                }
                if coefficients.len() > m {
                    return Err(ConfigError::TooManyCoefficients {
                        given: coefficients.len(),
                        multiples: m,
                    });
                }
                if let Some(&c) = coefficients.iter().find(|c| !c.is_finite()) {
                    return Err(ConfigError::InvalidParameter {
                        name: "coefficients",
                        value: c,
                        reason: "must be finite",
                    });
                }
                (1..=m)
                    .map(|k| {
                        let c = coefficients.get(k - 1).copied().unwrap_or(1.0 / m as f64);
                        Ok((base.scaled(k)?, c))
                    })
                    .collect()
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (spec, _) in self.terms()? {
            spec.validate()?;
        }
        Ok(())
    }
}

impl TopoTool for Tpi {
    fn get_tool_name(&self) -> String {
        "Tpi".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Calculates the topographic position index (elevation minus neighbourhood mean).".to_string()
    }

    #[tracing::instrument(skip_all, name = "tpi")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        let start = Instant::now();
        let cell_size = input.cell_size();
        let terms: Vec<(Kernel, f64)> = self
            .terms()?
            .iter()
            .map(|(spec, c)| Ok((Kernel::build(spec, cell_size)?, *c)))
            .collect::<std::result::Result<_, ConfigError>>()?;

        let nodata = input.nodata();
        let columns = input.columns();
        let output = compute_rows(&input.configs, cancel, |row| {
            let mut data = vec![nodata; columns as usize];
            for col in 0..columns {
                if let Some(z) = input.get(row, col) {
                    let value: Option<f64> = terms.iter().try_fold(0.0, |acc, (kernel, c)| {
                        kernel.reduce(input, row, col).map(|mean| acc + c * (z - mean))
                    });
                    if let Some(v) = value {
                        data[col as usize] = v;
                    }
                }
            }
            data
        })?;

        tracing::debug!(
            terms = terms.len(),
            "tpi done in {}",
            get_formatted_elapsed_time(start)
        );
        Ok(output)
    }
}
