//! The run configuration, read from JSON.
//!
//! Every section is optional and falls back to its defaults. An index is only
//! computed when its section is present. A minimal configuration that
//! computes the default hillshade and styles it in grayscale:
//!
//! ```
//! use topo_maps::config::TerrainConfig;
//! let config = TerrainConfig::from_json(r#"{
//!     "hillshade": {},
//!     "composite": {
//!         "style": "single_index",
//!         "layer": {
//!             "index": "hillshade",
//!             "ramp": [
//!                 { "value": 0.0, "colour": [0, 0, 0, 255] },
//!                 { "value": 255.0, "colour": [255, 255, 255, 255] }
//!             ]
//!         }
//!     }
//! }"#).unwrap();
//! assert!(config.slope.is_none());
//! ```

use serde::{Deserialize, Serialize};
use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::rendering::{CompositeStyle, IndexKind};
use crate::structures::{KernelRadius, KernelSpec};
use crate::tools::image_analysis::{GaussianFilter, OutlierClip, Resample, ResampleMethod, TargetResolution};
use crate::tools::terrain_analysis::{Hillshade, Lighting, Slope, SlopeUnits, Tpi, TpiMode, Tri};
use crate::tools::TopoTool;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChange {
    #[default]
    None,
    /// A new cell size in the grid's horizontal units.
    Absolute(f64),
    /// The current cell size times this factor.
    Relative(u32),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct ResampleConfig {
    pub change: ResolutionChange,
    pub method: ResampleMethod,
}

impl ResampleConfig {
    pub fn tool(&self) -> Option<Resample> {
        let target = match self.change {
            ResolutionChange::None => return None,
            ResolutionChange::Absolute(cell_size) => TargetResolution::Absolute(cell_size),
            ResolutionChange::Relative(factor) => TargetResolution::Factor(factor),
        };
        Some(Resample {
            target,
            method: self.method,
        })
    }
}

/// Largest window of the input that is processed, see `sampling::sample_window`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PreviewWindow {
    pub max_rows: usize,
    pub max_columns: usize,
}

/// Optional clean-up of a computed index: outlier clipping, then smoothing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct PostProcess {
    pub outlier_iqr: Option<f64>,
    pub gaussian_sigma: Option<f64>,
}

impl PostProcess {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(k) = self.outlier_iqr {
            OutlierClip { iqr_multiplier: k }.validate()?;
        }
        if let Some(sigma) = self.gaussian_sigma {
            GaussianFilter { sigma }.validate()?;
        }
        Ok(())
    }

    pub fn apply(&self, grid: Grid, cancel: &CancelToken) -> Result<Grid> {
        let mut grid = grid;
        if let Some(k) = self.outlier_iqr {
            grid = OutlierClip { iqr_multiplier: k }.run(&grid, cancel)?;
        }
        if let Some(sigma) = self.gaussian_sigma {
            grid = GaussianFilter { sigma }.run(&grid, cancel)?;
        }
        Ok(grid)
    }
}

fn default_z_factor() -> f64 {
    1.0
}

fn default_baseline() -> KernelRadius {
    KernelRadius::Cells(1)
}

fn default_scale() -> f64 {
    255.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlopeConfig {
    #[serde(default = "default_baseline")]
    pub baseline: KernelRadius,
    #[serde(default)]
    pub units: SlopeUnits,
    #[serde(default = "default_z_factor")]
    pub z_factor: f64,
    #[serde(default)]
    pub post: PostProcess,
    /// Keep the grid in the run outputs.
    #[serde(default)]
    pub export: bool,
}

impl Default for SlopeConfig {
    fn default() -> SlopeConfig {
        SlopeConfig {
            baseline: default_baseline(),
            units: SlopeUnits::default(),
            z_factor: default_z_factor(),
            post: PostProcess::default(),
            export: false,
        }
    }
}

impl SlopeConfig {
    pub fn tool(&self) -> Slope {
        Slope {
            baseline: self.baseline,
            units: self.units,
            z_factor: self.z_factor,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TpiConfig {
    pub mode: TpiMode,
    pub post: PostProcess,
    pub export: bool,
}

impl TpiConfig {
    pub fn tool(&self) -> Tpi {
        Tpi {
            mode: self.mode.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TriConfig {
    pub kernel: KernelSpec,
    pub post: PostProcess,
    pub export: bool,
}

impl TriConfig {
    pub fn tool(&self) -> Tri {
        Tri {
            kernel: self.kernel.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HillshadeConfig {
    #[serde(default = "default_z_factor")]
    pub z_factor: f64,
    #[serde(default)]
    pub lighting: Lighting,
    /// Multiply the shading by a slope term to darken steep terrain.
    #[serde(default)]
    pub combined: bool,
    /// Value of a fully lit cell.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub post: PostProcess,
    #[serde(default)]
    pub export: bool,
}

impl Default for HillshadeConfig {
    fn default() -> HillshadeConfig {
        HillshadeConfig {
            z_factor: default_z_factor(),
            lighting: Lighting::default(),
            combined: false,
            scale: default_scale(),
            post: PostProcess::default(),
            export: false,
        }
    }
}

impl HillshadeConfig {
    pub fn tool(&self) -> Hillshade {
        Hillshade {
            z_factor: self.z_factor,
            lighting: self.lighting.clone(),
            combined: self.combined,
            scale: self.scale,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    pub resample: ResampleConfig,
    pub preview: Option<PreviewWindow>,
    pub slope: Option<SlopeConfig>,
    pub tpi: Option<TpiConfig>,
    pub tri: Option<TriConfig>,
    pub hillshade: Option<HillshadeConfig>,
    pub composite: Option<CompositeStyle>,
}

impl TerrainConfig {
    /// Parses and validates a configuration.
    pub fn from_json(text: &str) -> std::result::Result<TerrainConfig, ConfigError> {
        let config: TerrainConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The indices this configuration computes.
    pub fn enabled_indices(&self) -> Vec<IndexKind> {
        let mut kinds = vec![];
        if self.slope.is_some() {
            kinds.push(IndexKind::Slope);
        }
        if self.tpi.is_some() {
            kinds.push(IndexKind::Tpi);
        }
        if self.tri.is_some() {
            kinds.push(IndexKind::Tri);
        }
        if self.hillshade.is_some() {
            kinds.push(IndexKind::Hillshade);
        }
        kinds
    }

    /// Checks every section, so that a run never fails on its configuration
    /// after computation has started.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(resample) = self.resample.tool() {
            resample.validate()?;
        }
        if let Some(preview) = self.preview {
            if preview.max_rows == 0 || preview.max_columns == 0 {
                return Err(ConfigError::InvalidPreview {
                    rows: preview.max_rows,
                    columns: preview.max_columns,
                });
            }
        }
        if let Some(slope) = &self.slope {
            slope.tool().validate()?;
            slope.baseline.to_cells(1.0)?;
            slope.post.validate()?;
        }
        if let Some(tpi) = &self.tpi {
            tpi.tool().validate()?;
            tpi.post.validate()?;
        }
        if let Some(tri) = &self.tri {
            tri.kernel.validate()?;
            tri.post.validate()?;
        }
        if let Some(hillshade) = &self.hillshade {
            hillshade.tool().validate()?;
            hillshade.post.validate()?;
        }
        if let Some(style) = &self.composite {
            style.validate(&self.enabled_indices())?;
        }
        Ok(())
    }
}
