//! Edge overlay for relief composites.
//!
//! The styled hillshade is optionally sharpened, reduced to 8-bit luminance
//! and optionally blurred. A 3x3 Laplacian then marks edges. Edge strengths
//! above the upper IQR fence are kept, 4-connected edge patches smaller than
//! `Q3 + min_area_iqr * IQR` of the patch sizes are dropped, and what is left
//! is painted in a single opaque colour.

use serde::{Deserialize, Serialize};
use topo_raster::{Grid, GridConfigs};

use super::colour_ramp::{to_u8, Rgba};
use super::compositor::{unsharp_mask, UnsharpMask};
use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::tools::image_analysis::{quartiles, GaussianFilter};
use crate::tools::TopoTool;

/// Multiplier of the edge-strength fence.
const STRENGTH_IQR: f64 = 1.5;

const NODATA: f64 = -1.0;

fn default_min_area_iqr() -> f64 {
    1.5
}

fn default_edge_colour() -> [u8; 3] {
    [0, 0, 0]
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EdgeOverlay {
    /// Applied to the styled hillshade before edge detection.
    #[serde(default)]
    pub sharpen: Option<UnsharpMask>,
    /// Gaussian blur of the luminance image, in pixels.
    #[serde(default)]
    pub sigma: Option<f64>,
    #[serde(default = "default_min_area_iqr")]
    pub min_area_iqr: f64,
    #[serde(default = "default_edge_colour")]
    pub colour: [u8; 3],
}

impl Default for EdgeOverlay {
    fn default() -> EdgeOverlay {
        EdgeOverlay {
            sharpen: None,
            sigma: None,
            min_area_iqr: default_min_area_iqr(),
            colour: default_edge_colour(),
        }
    }
}

impl EdgeOverlay {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(mask) = &self.sharpen {
            mask.validate()?;
        }
        if let Some(sigma) = self.sigma {
            GaussianFilter { sigma }.validate()?;
        }
        if !self.min_area_iqr.is_finite() || self.min_area_iqr < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "min_area_iqr",
                value: self.min_area_iqr,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Edge pixels of the styled hillshade `source`, as `f64` RGBA ready to be
    /// blended. Non-edge pixels are fully transparent.
    pub(super) fn layer(
        &self,
        configs: &GridConfigs,
        mut source: Vec<Rgba>,
        cancel: &CancelToken,
    ) -> Result<Vec<[f64; 4]>> {
        if let Some(mask) = &self.sharpen {
            unsharp_mask(configs, &mut source, mask, cancel)?;
        }
        let mut gray = luminance(configs, &source)?;
        if let Some(sigma) = self.sigma {
            gray = GaussianFilter { sigma }.run(&gray, cancel)?;
        }
        cancel.check()?;
        let strength = find_edges(&gray)?;
        let mut mask = binarize(&strength);
        remove_small_patches(
            &mut mask,
            configs.rows,
            configs.columns,
            self.min_area_iqr,
        );
        let [r, g, b] = self.colour;
        let edge = [r as f64, g as f64, b as f64, 255.0];
        Ok(mask
            .into_iter()
            .map(|on| if on { edge } else { [0.0; 4] })
            .collect())
    }
}

/// 8-bit luminance `(299 R + 587 G + 114 B) / 1000`. Transparent pixels are
/// nodata.
fn luminance(configs: &GridConfigs, pixels: &[Rgba]) -> Result<Grid> {
    let values = pixels
        .iter()
        .map(|p| {
            if p[3] == 0 {
                NODATA
            } else {
                ((p[0] as f64 * 299.0 + p[1] as f64 * 587.0 + p[2] as f64 * 114.0) / 1000.0)
                    .round()
            }
        })
        .collect();
    let mut configs = configs.clone();
    configs.nodata = NODATA;
    Ok(Grid::new(configs, values)?)
}

/// Laplacian `8 z - sum(neighbours)` clamped to [0, 255]. Neighbours that are
/// off the grid or nodata take the centre value.
fn find_edges(gray: &Grid) -> Result<Grid> {
    let columns = gray.columns();
    let values = (0..gray.rows())
        .flat_map(|row| (0..columns).map(move |column| (row, column)))
        .map(|(row, column)| match gray.get(row, column) {
            Some(z) => {
                let z = to_u8(z) as f64;
                let neighbours: f64 = topo_raster::WINDOW_OFFSETS
                    .iter()
                    .filter(|&&(dr, dc)| dr != 0 || dc != 0)
                    .map(|(dr, dc)| gray.get(row + dr, column + dc).map_or(z, |v| to_u8(v) as f64))
                    .sum();
                (8.0 * z - neighbours).clamp(0.0, 255.0)
            }
            None => NODATA,
        })
        .collect();
    Ok(Grid::new(gray.configs.clone(), values)?)
}

/// Cells whose strength exceeds `floor(Q3 + 1.5 IQR)` of the valid strengths.
fn binarize(strength: &Grid) -> Vec<bool> {
    let threshold = match quartiles(&mut strength.valid_values()) {
        Some((q1, q3)) => (q3 + STRENGTH_IQR * (q3 - q1)).floor(),
        None => return vec![false; strength.num_cells()],
    };
    strength
        .values()
        .iter()
        .map(|&v| !strength.is_nodata(v) && v > threshold)
        .collect()
}

/// Clears 4-connected patches of `mask` smaller than `Q3 + k IQR` of all patch
/// sizes.
fn remove_small_patches(mask: &mut [bool], rows: usize, columns: usize, k: f64) {
    let mut label = vec![usize::MAX; mask.len()];
    let mut sizes: Vec<usize> = vec![];
    let mut stack = vec![];
    for start in 0..mask.len() {
        if !mask[start] || label[start] != usize::MAX {
            continue;
        }
        let id = sizes.len();
        let mut size = 0;
        label[start] = id;
        stack.push(start);
        while let Some(i) = stack.pop() {
            size += 1;
            let (r, c) = (i / columns, i % columns);
            let mut visit = |j: usize| {
                if mask[j] && label[j] == usize::MAX {
                    label[j] = id;
                    stack.push(j);
                }
            };
            if r > 0 {
                visit(i - columns);
            }
            if r + 1 < rows {
                visit(i + columns);
            }
            if c > 0 {
                visit(i - 1);
            }
            if c + 1 < columns {
                visit(i + 1);
            }
        }
        sizes.push(size);
    }

    let mut areas: Vec<f64> = sizes.iter().map(|&s| s as f64).collect();
    let min_area = match quartiles(&mut areas) {
        Some((q1, q3)) => q3 + k * (q3 - q1),
        None => return,
    };
    tracing::debug!(patches = sizes.len(), min_area, "edge patches");
    for (on, &id) in mask.iter_mut().zip(&label) {
        if *on && (sizes[id] as f64) < min_area {
            *on = false;
        }
    }
}
