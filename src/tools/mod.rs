pub mod image_analysis;
pub mod terrain_analysis;

use rayon::prelude::*;
use topo_raster::{Grid, GridConfigs};

use crate::error::Result;
use crate::progress::CancelToken;

/// A grid-to-grid operation. Tools never modify their input; each run yields a
/// new grid with the same georeferencing unless the tool resamples.
pub trait TopoTool {
    fn get_tool_name(&self) -> String;
    fn get_tool_description(&self) -> String;
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid>;
}

/// Builds a grid with `configs` by computing every row independently on the
/// current rayon pool. Cancellation is checked before each row; a cancelled
/// run returns `TopoError::Cancelled` and no grid.
pub(crate) fn compute_rows<F>(configs: &GridConfigs, cancel: &CancelToken, f: F) -> Result<Grid>
where
    F: Fn(isize) -> Vec<f64> + Send + Sync,
{
    let rows = configs.rows as isize;
    let data: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            cancel.check()?;
            Ok(f(row))
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let mut output = Grid::initialize_using_config(configs)?;
    for (row, values) in data.into_iter().enumerate() {
        output.set_row_data(row as isize, values);
    }
    output.update_min_max();
    Ok(output)
}
