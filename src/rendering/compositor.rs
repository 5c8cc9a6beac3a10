//! Styling of index grids into RGBA images.
//!
//! Layers are mapped through their colour ramps and stacked bottom to top with
//! the Porter-Duff "over" operator. All blending happens on `f64` channels and
//! is rounded to 8 bits once, at the end.

use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use topo_common::structures::Array2D;
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::{Grid, GridConfigs};

use super::colour_ramp::{to_u8, ColourRamp, Rgba, TRANSPARENT};
use super::edges::EdgeOverlay;
use super::presets::Preset;
use crate::error::{ConfigError, DataError, Result};
use crate::progress::CancelToken;
use crate::tools::image_analysis::GaussianFilter;
use crate::tools::TopoTool;

/// A grid that can be used as a composite layer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Elevation,
    Slope,
    Tpi,
    Tri,
    Hillshade,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexKind::Elevation => "elevation",
            IndexKind::Slope => "slope",
            IndexKind::Tpi => "tpi",
            IndexKind::Tri => "tri",
            IndexKind::Hillshade => "hillshade",
        };
        f.write_str(s)
    }
}

/// The working elevation grid and whichever indices were computed from it.
/// All of them share dimensions and georeferencing.
#[derive(Debug, Clone)]
pub struct TerrainIndices {
    pub elevation: Grid,
    pub slope: Option<Grid>,
    pub tpi: Option<Grid>,
    pub tri: Option<Grid>,
    pub hillshade: Option<Grid>,
}

impl TerrainIndices {
    pub fn new(elevation: Grid) -> TerrainIndices {
        TerrainIndices {
            elevation,
            slope: None,
            tpi: None,
            tri: None,
            hillshade: None,
        }
    }

    pub fn get(&self, kind: IndexKind) -> Option<&Grid> {
        match kind {
            IndexKind::Elevation => Some(&self.elevation),
            IndexKind::Slope => self.slope.as_ref(),
            IndexKind::Tpi => self.tpi.as_ref(),
            IndexKind::Tri => self.tri.as_ref(),
            IndexKind::Hillshade => self.hillshade.as_ref(),
        }
    }

    pub fn set(&mut self, kind: IndexKind, grid: Grid) {
        match kind {
            IndexKind::Elevation => self.elevation = grid,
            IndexKind::Slope => self.slope = Some(grid),
            IndexKind::Tpi => self.tpi = Some(grid),
            IndexKind::Tri => self.tri = Some(grid),
            IndexKind::Hillshade => self.hillshade = Some(grid),
        }
    }
}

fn default_opacity() -> f64 {
    100.0
}

/// One index grid styled through a colour ramp.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Layer {
    pub index: IndexKind,
    pub ramp: ColourRamp,
    /// Percentage of the ramp's own alpha, 0 to 100.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Rescale the grid's valid range to [0, 1] before the ramp lookup.
    #[serde(default)]
    pub stretch: bool,
}

impl Layer {
    pub fn new(index: IndexKind, ramp: ColourRamp) -> Layer {
        Layer {
            index,
            ramp,
            opacity: 100.0,
            stretch: false,
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.opacity) {
            return Err(ConfigError::InvalidOpacity(self.opacity));
        }
        Ok(())
    }

    /// Ramp colours of every cell on f64 channels, alpha scaled by opacity.
    /// NoData cells are fully transparent.
    fn colours(&self, grid: &Grid) -> Vec<[f64; 4]> {
        let (min, max) = (grid.configs.minimum, grid.configs.maximum);
        let range = max - min;
        let opacity = self.opacity / 100.0;
        grid.values()
            .par_iter()
            .map(|&z| {
                if grid.is_nodata(z) {
                    return [0.0; 4];
                }
                let v = if self.stretch {
                    if range > 0.0 {
                        (z - min) / range
                    } else {
                        0.0
                    }
                } else {
                    z
                };
                let mut c = self.ramp.colour_at(v);
                c[3] *= opacity;
                c
            })
            .collect()
    }
}

/// Sharpening applied to the finished composite: blur each colour channel
/// with a Gaussian of standard deviation `radius` (in pixels), then push
/// pixels whose difference from the blur exceeds `threshold` further away from
/// it by `percent` of that difference.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct UnsharpMask {
    pub radius: f64,
    pub percent: f64,
    #[serde(default)]
    pub threshold: f64,
}

impl UnsharpMask {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        GaussianFilter { sigma: self.radius }.validate()?;
        if !self.percent.is_finite() || self.percent < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "percent",
                value: self.percent,
                reason: "must be finite and non-negative",
            });
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "threshold",
                value: self.threshold,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// Layers of a relief composite: a named preset or an explicit list, bottom
/// layer first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum LayerStack {
    Preset(Preset),
    Custom(Vec<Layer>),
}

impl LayerStack {
    pub fn layers(&self) -> Vec<Layer> {
        match self {
            LayerStack::Preset(preset) => preset.layers(),
            LayerStack::Custom(layers) => layers.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CompositeStyle {
    /// The elevation grid through `ramp`, or a stretched grayscale when no
    /// ramp is given.
    Original {
        #[serde(default)]
        ramp: Option<ColourRamp>,
    },
    SingleIndex { layer: Layer },
    /// Blended layers with optional contrast enhancement then sharpening.
    /// The edge overlay, when present, is drawn from the hillshade and placed
    /// directly above the topmost TRI layer, or on top when there is none.
    Relief {
        layers: LayerStack,
        #[serde(default)]
        contrast: Option<f64>,
        #[serde(default)]
        sharpen: Option<UnsharpMask>,
        #[serde(default)]
        edges: Option<EdgeOverlay>,
    },
}

impl CompositeStyle {
    fn layers(&self) -> Vec<Layer> {
        match self {
            CompositeStyle::Original { ramp } => {
                let mut layer = Layer::new(
                    IndexKind::Elevation,
                    ramp.clone().unwrap_or_else(ColourRamp::grayscale),
                );
                layer.stretch = ramp.is_none();
                vec![layer]
            }
            CompositeStyle::SingleIndex { layer } => vec![layer.clone()],
            CompositeStyle::Relief { layers, .. } => layers.layers(),
        }
    }

    /// Checks parameters and that every referenced index is `available`.
    pub fn validate(&self, available: &[IndexKind]) -> std::result::Result<(), ConfigError> {
        let layers = self.layers();
        if layers.is_empty() {
            return Err(ConfigError::MissingLayer("no layers".to_string()));
        }
        for layer in &layers {
            layer.validate()?;
            if layer.index != IndexKind::Elevation && !available.contains(&layer.index) {
                return Err(ConfigError::MissingLayer(layer.index.to_string()));
            }
        }
        if let CompositeStyle::Relief {
            contrast,
            sharpen,
            edges,
            ..
        } = self
        {
            if let Some(overlay) = edges {
                overlay.validate()?;
                if !available.contains(&IndexKind::Hillshade) {
                    return Err(ConfigError::MissingLayer(IndexKind::Hillshade.to_string()));
                }
            }
            if let Some(factor) = contrast {
                if !factor.is_finite() || *factor < 0.0 {
                    return Err(ConfigError::InvalidParameter {
                        name: "contrast",
                        value: *factor,
                        reason: "must be finite and non-negative",
                    });
                }
            }
            if let Some(mask) = sharpen {
                mask.validate()?;
            }
        }
        Ok(())
    }
}

/// An 8-bit RGBA image carrying the georeferencing of the grids it was made
/// from.
#[derive(Debug, Clone)]
pub struct RgbaRaster {
    pub configs: GridConfigs,
    pixels: Array2D<Rgba>,
}

impl RgbaRaster {
    fn from_pixels(configs: &GridConfigs, pixels: Vec<Rgba>) -> Result<RgbaRaster> {
        let mut array = Array2D::new(
            configs.rows as isize,
            configs.columns as isize,
            TRANSPARENT,
            TRANSPARENT,
        )
        .map_err(DataError::from)?;
        array.values_mut().copy_from_slice(&pixels);
        Ok(RgbaRaster {
            configs: configs.clone(),
            pixels: array,
        })
    }

    pub fn width(&self) -> u32 {
        self.configs.columns as u32
    }

    pub fn height(&self) -> u32 {
        self.configs.rows as u32
    }

    /// Transparent outside of the image.
    pub fn get_pixel(&self, row: isize, column: isize) -> Rgba {
        self.pixels.get_value(row, column)
    }

    pub fn pixels(&self) -> &[Rgba] {
        self.pixels.values()
    }

    /// Row-major RGBA bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.pixels.values().iter().flat_map(|p| p.iter().copied()).collect()
    }

    pub fn to_image(&self) -> image::RgbaImage {
        let mut img = image::RgbaImage::new(self.width(), self.height());
        for (i, p) in self.pixels.values().iter().enumerate() {
            let x = (i % self.configs.columns) as u32;
            let y = (i / self.configs.columns) as u32;
            img.put_pixel(x, y, image::Rgba(*p));
        }
        img
    }
}

/// Porter-Duff "over" of non-premultiplied colours.
fn over(src: [f64; 4], dst: [f64; 4]) -> [f64; 4] {
    let sa = src[3] / 255.0;
    let da = dst[3] / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0.0; 4];
    }
    let blend = |s: f64, d: f64| (s * sa + d * da * (1.0 - sa)) / out_a;
    [
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        out_a * 255.0,
    ]
}

/// PIL-style contrast: each colour channel moves away from the rounded mean
/// luminance of the visible pixels by `factor`.
fn enhance_contrast(pixels: &mut [Rgba], factor: f64) {
    let visible: Vec<&Rgba> = pixels.iter().filter(|p| p[3] > 0).collect();
    if visible.is_empty() {
        return;
    }
    let luminance: f64 = visible
        .iter()
        .map(|p| (p[0] as f64 * 299.0 + p[1] as f64 * 587.0 + p[2] as f64 * 114.0) / 1000.0)
        .sum();
    let mean = (luminance / visible.len() as f64).round();
    pixels.par_iter_mut().filter(|p| p[3] > 0).for_each(|p| {
        for c in p.iter_mut().take(3) {
            *c = to_u8(mean + factor * (*c as f64 - mean));
        }
    });
}

pub(super) fn unsharp_mask(
    configs: &GridConfigs,
    pixels: &mut [Rgba],
    mask: &UnsharpMask,
    cancel: &CancelToken,
) -> Result<()> {
    let nodata = -1.0;
    let filter = GaussianFilter { sigma: mask.radius };
    let mut channel_configs = configs.clone();
    channel_configs.nodata = nodata;
    for channel in 0..3 {
        let values: Vec<f64> = pixels
            .iter()
            .map(|p| if p[3] > 0 { p[channel] as f64 } else { nodata })
            .collect();
        let original = Grid::new(channel_configs.clone(), values)?;
        let blurred = filter.run(&original, cancel)?;
        for (i, p) in pixels.iter_mut().enumerate() {
            if p[3] == 0 {
                continue;
            }
            let o = original.values()[i];
            let diff = o - blurred.values()[i];
            if diff.abs() > mask.threshold {
                p[channel] = to_u8(o + diff * mask.percent / 100.0);
            }
        }
    }
    Ok(())
}

/// The grid behind a layer, checked against the working elevation grid.
fn layer_grid(indices: &TerrainIndices, kind: IndexKind) -> Result<&Grid> {
    let grid = indices
        .get(kind)
        .ok_or_else(|| ConfigError::MissingLayer(kind.to_string()))?;
    if !grid.same_dimensions(&indices.elevation) {
        return Err(
            DataError::DimensionMismatch(kind.to_string(), IndexKind::Elevation.to_string()).into(),
        );
    }
    Ok(grid)
}

/// The hillshade as styled by the topmost hillshade layer of the stack, or as
/// a stretched grayscale when the stack has none.
fn edge_source(indices: &TerrainIndices, layers: &[Layer]) -> Result<Vec<Rgba>> {
    let grid = layer_grid(indices, IndexKind::Hillshade)?;
    let layer = layers
        .iter()
        .rev()
        .find(|l| l.index == IndexKind::Hillshade)
        .cloned()
        .unwrap_or_else(|| {
            let mut l = Layer::new(IndexKind::Hillshade, ColourRamp::grayscale());
            l.stretch = true;
            l
        });
    Ok(layer
        .colours(grid)
        .iter()
        .map(|c| [to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3])])
        .collect())
}

/// Styles `indices` as described by `style`.
pub fn composite(indices: &TerrainIndices, style: &CompositeStyle) -> Result<RgbaRaster> {
    composite_cancellable(indices, style, &CancelToken::new())
}

#[tracing::instrument(skip_all, name = "composite")]
pub fn composite_cancellable(
    indices: &TerrainIndices,
    style: &CompositeStyle,
    cancel: &CancelToken,
) -> Result<RgbaRaster> {
    let available: Vec<IndexKind> = [
        IndexKind::Slope,
        IndexKind::Tpi,
        IndexKind::Tri,
        IndexKind::Hillshade,
    ]
    .into_iter()
    .filter(|&k| indices.get(k).is_some())
    .collect();
    style.validate(&available)?;
    let start = Instant::now();

    let configs = &indices.elevation.configs;
    let layers = style.layers();
    let edges = match style {
        CompositeStyle::Relief {
            edges: Some(overlay),
            ..
        } => Some(overlay.layer(configs, edge_source(indices, &layers)?, cancel)?),
        _ => None,
    };
    let edge_slot = layers
        .iter()
        .rposition(|l| l.index == IndexKind::Tri)
        .unwrap_or(layers.len().saturating_sub(1));

    let mut canvas = vec![[0f64; 4]; indices.elevation.num_cells()];
    let blend = |canvas: &mut [[f64; 4]], colours: &[[f64; 4]]| {
        canvas
            .par_iter_mut()
            .zip(colours.par_iter())
            .for_each(|(dst, src)| *dst = over(*src, *dst));
    };
    for (i, layer) in layers.iter().enumerate() {
        cancel.check()?;
        let grid = layer_grid(indices, layer.index)?;
        blend(&mut canvas, &layer.colours(grid));
        if i == edge_slot {
            if let Some(edge_colours) = &edges {
                blend(&mut canvas, edge_colours);
            }
        }
    }
    let mut pixels: Vec<Rgba> = canvas
        .iter()
        .map(|c| [to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3])])
        .collect();

    if let CompositeStyle::Relief {
        contrast, sharpen, ..
    } = style
    {
        if let Some(factor) = contrast {
            enhance_contrast(&mut pixels, *factor);
        }
        if let Some(mask) = sharpen {
            unsharp_mask(configs, &mut pixels, mask, cancel)?;
        }
    }

    tracing::debug!("composite done in {}", get_formatted_elapsed_time(start));
    RgbaRaster::from_pixels(configs, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> ColourRamp {
        ColourRamp::from_colours(&[[0, 0, 0, 255], [200, 100, 50, 255]]).unwrap()
    }

    fn indices() -> TerrainIndices {
        let elevation = Grid::from_rows(
            &[vec![0.0, 0.25, 0.5], vec![0.75, 1.0, -9999.0]],
            1.0,
            -9999.0,
        )
        .unwrap();
        let mut t = TerrainIndices::new(elevation.clone());
        t.slope = Some(elevation);
        t
    }

    #[test]
    fn original_without_ramp_is_stretched_grayscale() {
        let out = composite(&indices(), &CompositeStyle::Original { ramp: None }).unwrap();
        assert_eq!(out.get_pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(0, 2), [128, 128, 128, 255]);
        // nodata is transparent
        assert_eq!(out.get_pixel(1, 2), TRANSPARENT);
        assert_eq!((out.width(), out.height()), (3, 2));
    }

    #[test]
    fn opaque_top_layer_reproduces_its_ramp() {
        let top = Layer::new(IndexKind::Slope, ramp());
        let bottom = Layer::new(
            IndexKind::Elevation,
            ColourRamp::from_colours(&[[9, 9, 9, 255]]).unwrap(),
        );
        let style = CompositeStyle::Relief {
            layers: LayerStack::Custom(vec![bottom, top.clone()]),
            contrast: None,
            sharpen: None,
            edges: None,
        };
        let t = indices();
        let out = composite(&t, &style).unwrap();
        let slope = t.slope.as_ref().unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(out.get_pixel(row, col), top.ramp.map(slope.get_value(row, col)));
            }
        }
    }

    #[test]
    fn image_holds_the_same_pixels() {
        let out = composite(&indices(), &CompositeStyle::Original { ramp: None }).unwrap();
        let img = out.to_image();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 0).0, out.get_pixel(0, 2));
        assert_eq!(img.as_raw(), &out.as_bytes());
    }

    #[test]
    fn opacity_scales_alpha() {
        let mut layer = Layer::new(IndexKind::Elevation, ramp());
        layer.opacity = 50.0;
        let out = composite(&indices(), &CompositeStyle::SingleIndex { layer }).unwrap();
        assert_eq!(out.get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn half_transparent_over_opaque() {
        let dst = [0.0, 0.0, 0.0, 255.0];
        let src = [200.0, 100.0, 0.0, 127.5];
        let out = over(src, dst);
        assert!((out[0] - 100.0).abs() < 1e-9);
        assert!((out[3] - 255.0).abs() < 1e-9);
        assert_eq!(over([0.0; 4], [0.0; 4]), [0.0; 4]);
    }

    #[test]
    fn missing_layer_is_a_config_error() {
        let style = CompositeStyle::SingleIndex {
            layer: Layer::new(IndexKind::Hillshade, ramp()),
        };
        assert!(matches!(
            composite(&indices(), &style),
            Err(crate::error::TopoError::Config(ConfigError::MissingLayer(_)))
        ));
    }

    #[test]
    fn invalid_opacity() {
        let mut layer = Layer::new(IndexKind::Elevation, ramp());
        layer.opacity = 120.0;
        let style = CompositeStyle::SingleIndex { layer };
        assert_eq!(style.validate(&[]), Err(ConfigError::InvalidOpacity(120.0)));
    }

    #[test]
    fn contrast_moves_away_from_mean() {
        let mut pixels = vec![[100, 100, 100, 255], [200, 200, 200, 255], [7, 7, 7, 0]];
        enhance_contrast(&mut pixels, 2.0);
        assert_eq!(pixels[0], [50, 50, 50, 255]);
        assert_eq!(pixels[1], [250, 250, 250, 255]);
        assert_eq!(pixels[2], [7, 7, 7, 0]);
    }

    #[test]
    fn unsharp_mask_sharpens_edges_only() {
        let configs = GridConfigs::new(1, 6, 1.0, -1.0);
        let mut pixels: Vec<Rgba> = vec![
            [50, 50, 50, 255],
            [50, 50, 50, 255],
            [50, 50, 50, 255],
            [150, 150, 150, 255],
            [150, 150, 150, 255],
            [150, 150, 150, 255],
        ];
        let mask = UnsharpMask {
            radius: 1.0,
            percent: 100.0,
            threshold: 0.0,
        };
        unsharp_mask(&configs, &mut pixels, &mask, &CancelToken::new()).unwrap();
        assert!(pixels[2][0] < 50);
        assert!(pixels[3][0] > 150);
        assert_eq!(pixels[0][3], 255);
    }

    fn step_indices() -> TerrainIndices {
        let rows: Vec<Vec<f64>> = (0..6)
            .map(|_| (0..8).map(|c| if c < 4 { 0.0 } else { 1.0 }).collect())
            .collect();
        let elevation = Grid::from_rows(&rows, 1.0, -9999.0).unwrap();
        let mut t = TerrainIndices::new(elevation.clone());
        t.hillshade = Some(elevation.clone());
        t.tri = Some(elevation.clone());
        t.slope = Some(elevation);
        t
    }

    fn red_edges() -> Option<EdgeOverlay> {
        Some(EdgeOverlay {
            colour: [255, 0, 0],
            ..EdgeOverlay::default()
        })
    }

    #[test]
    fn edges_sit_above_tri() {
        let tri = Layer::new(
            IndexKind::Tri,
            ColourRamp::from_colours(&[[0, 0, 255, 255]]).unwrap(),
        );
        let style = CompositeStyle::Relief {
            layers: LayerStack::Custom(vec![
                Layer::new(IndexKind::Hillshade, ColourRamp::grayscale()),
                tri.clone(),
            ]),
            contrast: None,
            sharpen: None,
            edges: red_edges(),
        };
        let out = composite(&step_indices(), &style).unwrap();
        for row in 0..6 {
            assert_eq!(out.get_pixel(row, 4), [255, 0, 0, 255]);
            assert_eq!(out.get_pixel(row, 3), [0, 0, 255, 255]);
        }

        // an opaque layer above TRI hides the edges
        let style = CompositeStyle::Relief {
            layers: LayerStack::Custom(vec![
                Layer::new(IndexKind::Hillshade, ColourRamp::grayscale()),
                tri,
                Layer::new(IndexKind::Slope, ColourRamp::grayscale()),
            ]),
            contrast: None,
            sharpen: None,
            edges: red_edges(),
        };
        let out = composite(&step_indices(), &style).unwrap();
        assert_eq!(out.get_pixel(0, 4), [255, 255, 255, 255]);
    }

    #[test]
    fn edges_need_a_hillshade() {
        let style = CompositeStyle::Relief {
            layers: LayerStack::Custom(vec![Layer::new(IndexKind::Elevation, ramp())]),
            contrast: None,
            sharpen: None,
            edges: red_edges(),
        };
        assert_eq!(
            style.validate(&[IndexKind::Slope]),
            Err(ConfigError::MissingLayer("hillshade".to_string()))
        );
        assert!(style.validate(&[IndexKind::Hillshade]).is_ok());
    }

    #[test]
    fn style_json() {
        let style: CompositeStyle = serde_json::from_str(
            r#"{ "style": "relief", "layers": "vintage", "contrast": 1.2 }"#,
        )
        .unwrap();
        match style {
            CompositeStyle::Relief {
                layers: LayerStack::Preset(Preset::Vintage),
                contrast: Some(c),
                sharpen: None,
                edges: None,
            } => assert_eq!(c, 1.2),
            other => panic!("unexpected style {:?}", other),
        }
    }
}
