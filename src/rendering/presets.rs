//! Built-in layer stacks for relief composites.
//!
//! Every preset layer is stretched to its grid's range, so ramp stops sit on
//! [0, 1]. Layers are listed bottom first: hillshade, TRI, TPI, slope.

use serde::{Deserialize, Serialize};

use super::colour_ramp::{ColourRamp, ColourStop, Rgba};
use super::compositor::{IndexKind, Layer};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Sepia hillshade with warm, translucent index overlays.
    Vintage,
    /// Grey hillshade with saturated red, green and blue overlays.
    Rgb,
}

fn ramp(stops: &[(f64, Rgba)]) -> ColourRamp {
    let stops = stops
        .iter()
        .map(|&(value, colour)| ColourStop { value, colour })
        .collect();
    // the tables below are ascending and non-empty
    ColourRamp::new(stops).unwrap_or_else(|_| ColourRamp::grayscale())
}

impl Preset {
    pub fn ramp(&self, index: IndexKind) -> ColourRamp {
        match (self, index) {
            (Preset::Vintage, IndexKind::Elevation) => ramp(&[
                (0.0, [94, 73, 52, 255]),
                (0.5, [190, 164, 120, 255]),
                (1.0, [246, 236, 210, 255]),
            ]),
            (Preset::Vintage, IndexKind::Hillshade) => ramp(&[
                (0.0, [60, 45, 30, 255]),
                (1.0, [250, 240, 215, 255]),
            ]),
            (Preset::Vintage, IndexKind::Tri) => ramp(&[
                (0.0, [255, 255, 255, 0]),
                (1.0, [120, 70, 30, 160]),
            ]),
            (Preset::Vintage, IndexKind::Tpi) => ramp(&[
                (0.0, [40, 60, 90, 150]),
                (0.5, [128, 128, 128, 0]),
                (1.0, [200, 150, 80, 150]),
            ]),
            (Preset::Vintage, IndexKind::Slope) => ramp(&[
                (0.0, [255, 255, 255, 0]),
                (1.0, [80, 40, 20, 180]),
            ]),
            (Preset::Rgb, IndexKind::Elevation) => ramp(&[
                (0.0, [0, 0, 128, 255]),
                (0.25, [0, 160, 255, 255]),
                (0.5, [0, 200, 0, 255]),
                (0.75, [255, 220, 0, 255]),
                (1.0, [200, 0, 0, 255]),
            ]),
            (Preset::Rgb, IndexKind::Hillshade) => ramp(&[
                (0.0, [0, 0, 0, 255]),
                (1.0, [255, 255, 255, 255]),
            ]),
            (Preset::Rgb, IndexKind::Tri) => ramp(&[
                (0.0, [0, 255, 0, 0]),
                (1.0, [0, 160, 0, 140]),
            ]),
            (Preset::Rgb, IndexKind::Tpi) => ramp(&[
                (0.0, [0, 0, 255, 160]),
                (0.5, [255, 255, 255, 0]),
                (1.0, [255, 0, 0, 160]),
            ]),
            (Preset::Rgb, IndexKind::Slope) => ramp(&[
                (0.0, [255, 0, 0, 0]),
                (1.0, [220, 0, 0, 180]),
            ]),
        }
    }

    pub fn layers(&self) -> Vec<Layer> {
        [
            IndexKind::Hillshade,
            IndexKind::Tri,
            IndexKind::Tpi,
            IndexKind::Slope,
        ]
        .into_iter()
        .map(|index| Layer {
            index,
            ramp: self.ramp(index),
            opacity: 100.0,
            stretch: true,
        })
        .collect()
    }
}
