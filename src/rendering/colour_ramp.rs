use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An 8-bit red, green, blue, alpha colour.
pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ColourStop {
    pub value: f64,
    pub colour: Rgba,
}

/// A piecewise-linear colour ramp. Stops are strictly ascending by value and
/// there is at least one of them; both are checked on construction and when
/// deserializing. Values outside of the stop range take the end colours.
///
/// ```
/// use topo_maps::rendering::ColourRamp;
/// let ramp = ColourRamp::from_colours(&[[0, 0, 0, 255], [200, 100, 0, 255]]).unwrap();
/// assert_eq!(ramp.map(0.5), [100, 50, 0, 255]);
/// assert_eq!(ramp.map(7.0), [200, 100, 0, 255]);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Vec<ColourStop>", into = "Vec<ColourStop>")]
pub struct ColourRamp {
    stops: Vec<ColourStop>,
}

impl TryFrom<Vec<ColourStop>> for ColourRamp {
    type Error = ConfigError;

    fn try_from(stops: Vec<ColourStop>) -> Result<ColourRamp, ConfigError> {
        ColourRamp::new(stops)
    }
}

impl From<ColourRamp> for Vec<ColourStop> {
    fn from(ramp: ColourRamp) -> Vec<ColourStop> {
        ramp.stops
    }
}

impl ColourRamp {
    pub fn new(stops: Vec<ColourStop>) -> Result<ColourRamp, ConfigError> {
        if stops.is_empty() {
            return Err(ConfigError::EmptyRamp);
        }
        for (index, stop) in stops.iter().enumerate() {
            let ascending = index == 0 || stop.value > stops[index - 1].value;
            if !stop.value.is_finite() || !ascending {
                return Err(ConfigError::UnsortedRamp {
                    index,
                    value: stop.value,
                });
            }
        }
        Ok(ColourRamp { stops })
    }

    /// Evenly spaced stops on [0, 1].
    pub fn from_colours(colours: &[Rgba]) -> Result<ColourRamp, ConfigError> {
        let n = colours.len();
        let stops = colours
            .iter()
            .enumerate()
            .map(|(i, &colour)| ColourStop {
                value: if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 },
                colour,
            })
            .collect();
        ColourRamp::new(stops)
    }

    /// Opaque black at 0 to opaque white at 1.
    pub fn grayscale() -> ColourRamp {
        ColourRamp {
            stops: vec![
                ColourStop {
                    value: 0.0,
                    colour: [0, 0, 0, 255],
                },
                ColourStop {
                    value: 1.0,
                    colour: [255, 255, 255, 255],
                },
            ],
        }
    }

    pub fn stops(&self) -> &[ColourStop] {
        &self.stops
    }

    /// The interpolated colour of `value`, unrounded, channels on [0, 255].
    pub fn colour_at(&self, value: f64) -> [f64; 4] {
        let to_f64 = |c: Rgba| [c[0] as f64, c[1] as f64, c[2] as f64, c[3] as f64];
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];
        if value.is_nan() || value <= first.value {
            return to_f64(first.colour);
        }
        if value >= last.value {
            return to_f64(last.colour);
        }
        // value lies strictly inside the range, so an upper stop exists past the first
        let upper = self.stops.partition_point(|s| s.value <= value);
        let (a, b) = (self.stops[upper - 1], self.stops[upper]);
        let t = (value - a.value) / (b.value - a.value);
        let (ca, cb) = (to_f64(a.colour), to_f64(b.colour));
        [
            ca[0] + t * (cb[0] - ca[0]),
            ca[1] + t * (cb[1] - ca[1]),
            ca[2] + t * (cb[2] - ca[2]),
            ca[3] + t * (cb[3] - ca[3]),
        ]
    }

    pub fn map(&self, value: f64) -> Rgba {
        let c = self.colour_at(value);
        [to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3])]
    }
}

pub(crate) fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
