/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::f64;
use std::f64::consts::PI;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::Grid;

use crate::error::{ConfigError, Result};
use crate::progress::CancelToken;
use crate::tools::{compute_rows, TopoTool};

/// An illumination source. Azimuth is in degrees clockwise from north,
/// altitude in degrees above the horizon.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub azimuth: f64,
    pub altitude: f64,
}

impl Default for LightSource {
    fn default() -> LightSource {
        LightSource {
            azimuth: 315.0,
            altitude: 45.0,
        }
    }
}

impl LightSource {
    /// The four lights of a multidirectional hillshade (225, 270, 315 and 360
    /// degrees), all at the same altitude.
    pub fn multidirectional(altitude: f64) -> Vec<LightSource> {
        [225.0, 270.0, 315.0, 360.0]
            .iter()
            .map(|&azimuth| LightSource { azimuth, altitude })
            .collect()
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.azimuth.is_finite() {
            return Err(ConfigError::InvalidLight(format!(
                "azimuth {} is not a number",
                self.azimuth
            )));
        }
        if !(0.0..=90.0).contains(&self.altitude) {
            return Err(ConfigError::InvalidLight(format!(
                "altitude {} is outside of [0, 90]",
                self.altitude
            )));
        }
        Ok(())
    }
}

/// How the shading of several lights is merged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LightCombination {
    Mean,
    Max,
    /// One non-negative weight per light.
    Weighted(Vec<f64>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    Single(LightSource),
    Multiple {
        lights: Vec<LightSource>,
        combine: LightCombination,
    },
}

impl Default for Lighting {
    fn default() -> Lighting {
        Lighting::Single(LightSource::default())
    }
}

impl Lighting {
    fn lights(&self) -> &[LightSource] {
        match self {
            Lighting::Single(light) => std::slice::from_ref(light),
            Lighting::Multiple { lights, .. } => lights,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.lights().is_empty() {
            return Err(ConfigError::InvalidLight("no light sources given".to_string()));
        }
        for light in self.lights() {
            light.validate()?;
        }
        if let Lighting::Multiple {
            lights,
            combine: LightCombination::Weighted(weights),
        } = self
        {
            if weights.len() != lights.len() {
                return Err(ConfigError::InvalidLightWeights(format!(
                    "{} weights for {} lights",
                    weights.len(),
                    lights.len()
                )));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(ConfigError::InvalidLightWeights(
                    "weights must be finite and non-negative".to_string(),
                ));
            }
            if weights.iter().sum::<f64>() <= 0.0 {
                return Err(ConfigError::InvalidLightWeights(
                    "weights sum to zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Precomputed trigonometry of one light.
struct Illumination {
    cos_zenith: f64,
    sin_zenith: f64,
    azimuth: f64,
}

impl From<&LightSource> for Illumination {
    fn from(light: &LightSource) -> Illumination {
        let zenith = (90.0 - light.altitude).to_radians();
        let mut azimuth = 360.0 - light.azimuth + 90.0;
        if azimuth >= 360.0 {
            azimuth -= 360.0;
        }
        Illumination {
            cos_zenith: zenith.cos(),
            sin_zenith: zenith.sin(),
            azimuth: azimuth.to_radians(),
        }
    }
}

/// This tool performs a hillshade operation (also called shaded relief). The
/// gradient is taken with Horn's (1981) 3x3 operator, on elevations multiplied
/// by `z_factor`. For each light, the illumination of a cell is
///
/// > *HS* = cos(*Z*) cos(*S*) + sin(*Z*) sin(*S*) cos(*Az* - *A*)
///
/// where *Z* is the zenith angle of the light, *Az* its azimuth in
/// mathematical convention, and *S* and *A* the slope and aspect of the cell.
/// *HS* is clamped to [0, 1], merged over the lights as configured and
/// multiplied by `scale`.
///
/// With `combined`, the shading is darkened by slope,
/// `1 - acos(HS) atan(tan S) / (pi / 2)^2`, which emphasizes ridges on
/// otherwise evenly lit terrain.
///
/// Cells on the border or next to nodata use a mirrored 3x3 window, which turns
/// the operator into a one-sided difference.
///
/// # Reference
/// Horn, B. K. (1981). Hill shading and the reflectance map. Proceedings of the
/// IEEE, 69(1), 14-47.
#[derive(Debug, Clone, PartialEq)]
pub struct Hillshade {
    pub z_factor: f64,
    pub lighting: Lighting,
    pub combined: bool,
    pub scale: f64,
}

impl Default for Hillshade {
    fn default() -> Hillshade {
        Hillshade {
            z_factor: 1.0,
            lighting: Lighting::default(),
            combined: false,
            scale: 255.0,
        }
    }
}

impl Hillshade {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.z_factor.is_finite() || self.z_factor == 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "z_factor",
                value: self.z_factor,
                reason: "must be finite and non-zero",
            });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "scale",
                value: self.scale,
                reason: "must be finite and positive",
            });
        }
        self.lighting.validate()
    }
}

impl TopoTool for Hillshade {
    fn get_tool_name(&self) -> String {
        "Hillshade".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Calculates a hillshade raster from one or more light sources.".to_string()
    }

    #[tracing::instrument(skip_all, name = "hillshade")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        self.validate()?;
        let start = Instant::now();

        let lights: Vec<Illumination> = self.lighting.lights().iter().map(Illumination::from).collect();
        let eight_resx = 8.0 * input.configs.resolution_x;
        let eight_resy = 8.0 * input.configs.resolution_y;
        let z_factor = self.z_factor;
        let nodata = input.nodata();
        let columns = input.columns();
        let half_pi_sq = (PI / 2.0) * (PI / 2.0);

        let output = compute_rows(&input.configs, cancel, |row| {
            let mut data = vec![nodata; columns as usize];
            let mut shades = vec![0f64; lights.len()];
            for col in 0..columns {
                let z = match input.window_3x3(row, col) {
                    Some(w) => w,
                    None => continue,
                };
                let dzdx = z_factor * ((z[2] + 2.0 * z[5] + z[8]) - (z[0] + 2.0 * z[3] + z[6])) / eight_resx;
                let dzdy = z_factor * ((z[6] + 2.0 * z[7] + z[8]) - (z[0] + 2.0 * z[1] + z[2])) / eight_resy;
                let tan_slope = (dzdx * dzdx + dzdy * dzdy).sqrt();
                let slope = tan_slope.atan();
                let aspect = if dzdx != 0.0 {
                    let a = dzdy.atan2(-dzdx);
                    if a < 0.0 {
                        a + 2.0 * PI
                    } else {
                        a
                    }
                } else if dzdy > 0.0 {
                    PI / 2.0
                } else if dzdy < 0.0 {
                    3.0 * PI / 2.0
                } else {
                    0.0
                };
                let (sin_slope, cos_slope) = slope.sin_cos();
                for (shade, light) in shades.iter_mut().zip(&lights) {
                    let hs = light.cos_zenith * cos_slope
                        + light.sin_zenith * sin_slope * (light.azimuth - aspect).cos();
                    *shade = hs.clamp(0.0, 1.0);
                }
                let mut hs = match &self.lighting {
                    Lighting::Single(_) => shades[0],
                    Lighting::Multiple { combine, .. } => match combine {
                        LightCombination::Mean => shades.iter().sum::<f64>() / shades.len() as f64,
                        LightCombination::Max => shades.iter().cloned().fold(0.0, f64::max),
                        LightCombination::Weighted(weights) => {
                            let total: f64 = weights.iter().sum();
                            shades.iter().zip(weights).map(|(s, w)| s * w).sum::<f64>() / total
                        }
                    },
                };
                if self.combined {
                    hs = (1.0 - hs.acos() * slope / half_pi_sq).clamp(0.0, 1.0);
                }
                data[col as usize] = hs * self.scale;
            }
            data
        })?;

        tracing::debug!(
            lights = lights.len(),
            "hillshade done in {}",
            get_formatted_elapsed_time(start)
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Elevation rising to the south-east by one unit per cell.
    fn facing_north_west() -> Grid {
        let data: Vec<Vec<f64>> = (0..5)
            .map(|r| (0..5).map(|c| (r + c) as f64).collect())
            .collect();
        Grid::from_rows(&data, 1.0, -9999.0).unwrap()
    }

    #[test]
    fn flat_terrain_is_lit_by_altitude() {
        let g = Grid::filled(4, 4, 1.0, 10.0, -9999.0).unwrap();
        let out = Hillshade::default().run(&g, &CancelToken::new()).unwrap();
        let expected = 255.0 * 45f64.to_radians().cos();
        for &v in out.values() {
            assert_relative_eq!(v, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn slope_facing_the_light_is_brighter() {
        let g = facing_north_west();
        let lit = Hillshade::default().run(&g, &CancelToken::new()).unwrap();
        let flat = 255.0 * 45f64.to_radians().cos();
        let expected = 255.0 * (45f64.to_radians() - 2f64.sqrt().atan()).cos();
        assert_relative_eq!(lit.get_value(2, 2), expected, epsilon = 1e-9);
        // mirrored borders see the same plane
        assert_relative_eq!(lit.get_value(0, 0), expected, epsilon = 1e-9);
        assert!(lit.get_value(2, 2) > flat);

        let opposite = Hillshade {
            lighting: Lighting::Single(LightSource {
                azimuth: 135.0,
                altitude: 45.0,
            }),
            ..Default::default()
        };
        let shaded = opposite.run(&g, &CancelToken::new()).unwrap();
        assert!(shaded.get_value(2, 2) < flat);
    }

    #[test]
    fn one_light_multiple_equals_single() {
        let g = facing_north_west();
        let light = LightSource {
            azimuth: 200.0,
            altitude: 30.0,
        };
        let single = Hillshade {
            lighting: Lighting::Single(light),
            ..Default::default()
        };
        for combine in [
            LightCombination::Mean,
            LightCombination::Max,
            LightCombination::Weighted(vec![2.0]),
        ] {
            let multiple = Hillshade {
                lighting: Lighting::Multiple {
                    lights: vec![light],
                    combine,
                },
                ..Default::default()
            };
            let a = single.run(&g, &CancelToken::new()).unwrap();
            let b = multiple.run(&g, &CancelToken::new()).unwrap();
            for (x, y) in a.values().iter().zip(b.values()) {
                assert_relative_eq!(*x, *y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn multidirectional_lights() {
        let lights = LightSource::multidirectional(45.0);
        let azimuths: Vec<f64> = lights.iter().map(|l| l.azimuth).collect();
        assert_eq!(azimuths, vec![225.0, 270.0, 315.0, 360.0]);
        let h = Hillshade {
            lighting: Lighting::Multiple {
                lights,
                combine: LightCombination::Max,
            },
            ..Default::default()
        };
        let out = h.run(&facing_north_west(), &CancelToken::new()).unwrap();
        assert!(out.values().iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn combined_shading_darkens_slopes_only() {
        let flat = Grid::filled(3, 3, 1.0, 10.0, -9999.0).unwrap();
        let h = Hillshade {
            combined: true,
            ..Default::default()
        };
        let out = h.run(&flat, &CancelToken::new()).unwrap();
        assert_relative_eq!(out.get_value(1, 1), 255.0, epsilon = 1e-9);
        let sloped = h.run(&facing_north_west(), &CancelToken::new()).unwrap();
        assert!(sloped.get_value(2, 2) < 255.0);
    }

    #[test]
    fn bad_weights_are_rejected() {
        let h = Hillshade {
            lighting: Lighting::Multiple {
                lights: LightSource::multidirectional(45.0),
                combine: LightCombination::Weighted(vec![1.0]),
            },
            ..Default::default()
        };
        assert!(matches!(h.validate(), Err(ConfigError::InvalidLightWeights(_))));
        let empty = Hillshade {
            lighting: Lighting::Multiple {
                lights: vec![],
                combine: LightCombination::Mean,
            },
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }
}
