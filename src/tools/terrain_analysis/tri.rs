/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::time::Instant;

use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::error::Result;
use crate::progress::CancelToken;
use crate::structures::{Kernel, KernelSpec};
use crate::tools::{compute_rows, TopoTool};

/// Terrain ruggedness index (Riley et al., 1999), generalized to weighted
/// kernels: the square root of the weighted mean squared elevation difference
/// between a cell and its neighbours. The default neighbourhood is the eight
/// adjacent cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tri {
    pub kernel: KernelSpec,
}

impl TopoTool for Tri {
    fn get_tool_name(&self) -> String {
        "Tri".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Calculates the terrain ruggedness index.".to_string()
    }

    #[tracing::instrument(skip_all, name = "tri")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        let start = Instant::now();
        let kernel = Kernel::build(&self.kernel, input.cell_size())?;
        let nodata = input.nodata();
        let columns = input.columns();

        let output = compute_rows(&input.configs, cancel, |row| {
            let mut data = vec![nodata; columns as usize];
            for col in 0..columns {
                if let Some(z) = input.get(row, col) {
                    if let Some(msd) = kernel.reduce_with(input, row, col, |zn| (zn - z) * (zn - z)) {
                        data[col as usize] = msd.sqrt();
                    }
                }
            }
            data
        })?;

        tracing::debug!("tri done in {}", get_formatted_elapsed_time(start));
        Ok(output)
    }
}
