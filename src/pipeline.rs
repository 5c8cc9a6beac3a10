//! Runs a `TerrainConfig` against an elevation grid.
//!
//! Stages run in a fixed order on a dedicated rayon pool: preview window,
//! resampling, slope, TPI, TRI, hillshade, then the composite. Each index
//! stage is row-parallel internally. Milestones are reported to the caller's
//! observer as each stage starts.

use std::time::Instant;

use topo_common::configs::Settings;
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::config::{PostProcess, TerrainConfig};
use crate::error::{ConfigError, DataError, Result, TopoError};
use crate::progress::{CancelToken, Milestone, ProgressObserver};
use crate::rendering::{composite_cancellable, IndexKind, RgbaRaster, TerrainIndices};
use crate::sampling::sample_window;
use crate::tools::TopoTool;

/// What a completed run hands back. All grids share the georeferencing of
/// the working elevation grid.
#[derive(Debug, Clone)]
pub struct TerrainOutputs {
    /// The elevation grid after the preview window and resampling.
    pub elevation: Grid,
    /// Indices whose configuration section asked for export, in computation
    /// order.
    pub exports: Vec<(IndexKind, Grid)>,
    pub composite: Option<RgbaRaster>,
}

impl TerrainOutputs {
    pub fn export(&self, kind: IndexKind) -> Option<&Grid> {
        self.exports.iter().find(|(k, _)| *k == kind).map(|(_, g)| g)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(TerrainOutputs),
    Cancelled,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

/// Runs `config` on a single-band elevation input. See `run_with_settings`.
pub fn run(
    config: &TerrainConfig,
    dem: &Grid,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<RunOutcome> {
    run_with_settings(config, dem, &Settings::default(), observer, cancel)
}

/// Runs `config` on a multi-band input. Only single-band elevation inputs are
/// supported.
pub fn run_bands(
    config: &TerrainConfig,
    bands: &[Grid],
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<RunOutcome> {
    match bands {
        [dem] => run(config, dem, observer, cancel),
        _ => {
            observer.milestone(Milestone::Aborted);
            Err(ConfigError::UnsupportedBandCount(bands.len()).into())
        }
    }
}

/// Validates the configuration and the grid, then computes every configured
/// output. Configuration and data problems are returned as errors before any
/// stage starts. A cancelled run yields `RunOutcome::Cancelled` and no outputs.
/// `Aborted` is reported for both.
pub fn run_with_settings(
    config: &TerrainConfig,
    dem: &Grid,
    settings: &Settings,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<RunOutcome> {
    let result = check_inputs(config, dem).and_then(|_| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.num_procs())
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
        pool.install(|| compute(config, dem, observer, cancel))
    });
    match result {
        Ok(outputs) => {
            observer.milestone(Milestone::Completed);
            Ok(RunOutcome::Completed(outputs))
        }
        Err(TopoError::Cancelled) => {
            observer.milestone(Milestone::Aborted);
            Ok(RunOutcome::Cancelled)
        }
        Err(e) => {
            tracing::error!("{}", e);
            observer.milestone(Milestone::Aborted);
            Err(e)
        }
    }
}

fn check_inputs(config: &TerrainConfig, dem: &Grid) -> Result<()> {
    config.validate()?;
    if dem.is_empty() {
        return Err(DataError::EmptyGrid.into());
    }
    check_has_data(dem)
}

fn check_has_data(grid: &Grid) -> Result<()> {
    if grid.num_valid_cells() == 0 {
        return Err(DataError::AllNodata.into());
    }
    Ok(())
}

fn index_stage<T: TopoTool>(
    tool: &T,
    post: &PostProcess,
    elevation: &Grid,
    cancel: &CancelToken,
) -> Result<Grid> {
    let start = Instant::now();
    let grid = post.apply(tool.run(elevation, cancel)?, cancel)?;
    tracing::info!(
        "{} done in {}",
        tool.get_tool_name(),
        get_formatted_elapsed_time(start)
    );
    Ok(grid)
}

#[tracing::instrument(skip_all, name = "terrain_run")]
fn compute(
    config: &TerrainConfig,
    dem: &Grid,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<TerrainOutputs> {
    let start = Instant::now();
    cancel.check()?;

    let mut elevation = match config.preview {
        Some(preview) => {
            let window = sample_window(dem, preview.max_rows, preview.max_columns)?;
            check_has_data(&window)?;
            window
        }
        None => dem.clone(),
    };
    if let Some(resample) = config.resample.tool() {
        observer.milestone(Milestone::ResampleStart);
        elevation = resample.run(&elevation, cancel)?;
        check_has_data(&elevation)?;
    }
    tracing::debug!(
        rows = elevation.configs.rows,
        columns = elevation.configs.columns,
        cell_size = elevation.cell_size(),
        "working grid ready"
    );

    let mut indices = TerrainIndices::new(elevation);
    let mut exports = vec![];
    if let Some(section) = &config.slope {
        observer.milestone(Milestone::SlopeStart);
        let grid = index_stage(&section.tool(), &section.post, &indices.elevation, cancel)?;
        if section.export {
            exports.push((IndexKind::Slope, grid.clone()));
        }
        indices.set(IndexKind::Slope, grid);
    }
    if let Some(section) = &config.tpi {
        observer.milestone(Milestone::TpiStart);
        let grid = index_stage(&section.tool(), &section.post, &indices.elevation, cancel)?;
        if section.export {
            exports.push((IndexKind::Tpi, grid.clone()));
        }
        indices.set(IndexKind::Tpi, grid);
    }
    if let Some(section) = &config.tri {
        observer.milestone(Milestone::TriStart);
        let grid = index_stage(&section.tool(), &section.post, &indices.elevation, cancel)?;
        if section.export {
            exports.push((IndexKind::Tri, grid.clone()));
        }
        indices.set(IndexKind::Tri, grid);
    }
    if let Some(section) = &config.hillshade {
        observer.milestone(Milestone::HillshadeStart);
        let grid = index_stage(&section.tool(), &section.post, &indices.elevation, cancel)?;
        if section.export {
            exports.push((IndexKind::Hillshade, grid.clone()));
        }
        indices.set(IndexKind::Hillshade, grid);
    }

    let composite = match &config.composite {
        Some(style) => {
            observer.milestone(Milestone::CompositeStart);
            Some(composite_cancellable(&indices, style, cancel)?)
        }
        None => None,
    };
    cancel.check()?;

    tracing::info!("terrain run done in {}", get_formatted_elapsed_time(start));
    Ok(TerrainOutputs {
        elevation: indices.elevation,
        exports,
        composite,
    })
}
