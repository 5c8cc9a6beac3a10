/////////////////////////////////////////////////////////
// Weighted neighbourhood kernels and their reductions //
/////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use topo_raster::Grid;

use crate::error::ConfigError;

/// Kernel size, either as a ground distance from the centre (same unit as the
/// grid's cell size) or as a number of cells from the centre.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KernelRadius {
    Distance(f64),
    Cells(usize),
}

impl KernelRadius {
    /// Number of cells from the centre to the edge of the window. Distances
    /// round up to whole cells.
    pub fn to_cells(&self, cell_size: f64) -> Result<usize, ConfigError> {
        match *self {
            KernelRadius::Distance(d) => {
                if !d.is_finite() || d <= 0.0 {
                    return Err(ConfigError::InvalidRadius(format!(
                        "distance {} must be finite and positive",
                        d
                    )));
                }
                Ok(((d / cell_size).ceil() as usize).max(1))
            }
            KernelRadius::Cells(0) => Err(ConfigError::InvalidRadius(
                "cell count must be at least 1".to_string(),
            )),
            KernelRadius::Cells(n) => Ok(n),
        }
    }

    /// A sigma given in the same unit as this radius, expressed in cells.
    fn sigma_in_cells(&self, sigma: f64, cell_size: f64) -> f64 {
        match self {
            KernelRadius::Distance(_) => sigma / cell_size,
            KernelRadius::Cells(_) => sigma,
        }
    }

    fn scaled(&self, k: usize) -> KernelRadius {
        match *self {
            KernelRadius::Distance(d) => KernelRadius::Distance(d * k as f64),
            KernelRadius::Cells(n) => KernelRadius::Cells(n * k),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MeanWindow {
    #[default]
    Square,
    Circle,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

/// Shape and size of a neighbourhood kernel.
///
/// ```json
/// { "shape": "gaussian", "radius": { "distance": 30.0 }, "sigma": 10.0 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum KernelSpec {
    Mean {
        radius: KernelRadius,
        #[serde(default)]
        window: MeanWindow,
    },
    /// Ring between `inner_radius` (exclusive) and `radius` (inclusive),
    /// measured as Chebyshev distance. Only the outermost ring when no inner
    /// radius is given.
    Donut {
        radius: KernelRadius,
        #[serde(default)]
        inner_radius: Option<KernelRadius>,
    },
    /// `sigma` shares the unit of `radius`.
    Gaussian { radius: KernelRadius, sigma: f64 },
    /// `sigma` shares the unit of `radius`.
    InverseGaussian { radius: KernelRadius, sigma: f64 },
    Adjacent {
        #[serde(default)]
        connectivity: Connectivity,
    },
    FourDirectionEdge { radius: KernelRadius },
    EightDirectionEdge { radius: KernelRadius },
}

impl Default for KernelSpec {
    fn default() -> KernelSpec {
        KernelSpec::Adjacent {
            connectivity: Connectivity::Eight,
        }
    }
}

impl KernelSpec {
    /// The same kernel with its radius (and sigma) multiplied by `k`. The
    /// adjacent kernel has no radius to scale.
    pub fn scaled(&self, k: usize) -> Result<KernelSpec, ConfigError> {
        let kf = k as f64;
        Ok(match self {
            KernelSpec::Mean { radius, window } => KernelSpec::Mean {
                radius: radius.scaled(k),
                window: *window,
            },
            KernelSpec::Donut {
                radius,
                inner_radius,
            } => KernelSpec::Donut {
                radius: radius.scaled(k),
                inner_radius: inner_radius.map(|r| r.scaled(k)),
            },
            KernelSpec::Gaussian { radius, sigma } => KernelSpec::Gaussian {
                radius: radius.scaled(k),
                sigma: sigma * kf,
            },
            KernelSpec::InverseGaussian { radius, sigma } => KernelSpec::InverseGaussian {
                radius: radius.scaled(k),
                sigma: sigma * kf,
            },
            KernelSpec::FourDirectionEdge { radius } => KernelSpec::FourDirectionEdge {
                radius: radius.scaled(k),
            },
            KernelSpec::EightDirectionEdge { radius } => KernelSpec::EightDirectionEdge {
                radius: radius.scaled(k),
            },
            KernelSpec::Adjacent { .. } => return Err(ConfigError::AdjacentInMultipleMode),
        })
    }

    /// Checks the parameters that don't depend on the grid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // any positive cell size gives the same verdict
        Kernel::build(self, 1.0).map(|_| ())
    }
}

/// A built kernel: `(dx, dy, weight)` offsets from the centre cell, where `dx`
/// is a column offset and `dy` a row offset. Only cells with a positive weight
/// are kept; weights sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    radius: usize,
    offsets: Vec<(isize, isize, f64)>,
}

impl Kernel {
    pub fn build(spec: &KernelSpec, cell_size: f64) -> Result<Kernel, ConfigError> {
        let mut offsets: Vec<(isize, isize, f64)> = vec![];
        let radius = match spec {
            KernelSpec::Adjacent { connectivity } => {
                for (dx, dy) in [(0, -1), (-1, 0), (1, 0), (0, 1)] {
                    offsets.push((dx, dy, 1.0));
                }
                if *connectivity == Connectivity::Eight {
                    for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
                        offsets.push((dx, dy, 1.0));
                    }
                }
                1
            }
            KernelSpec::Mean { radius, window } => {
                let r = radius.to_cells(cell_size)?;
                let ri = r as isize;
                let max_d2 = (r * r) as isize;
                for dy in -ri..=ri {
                    for dx in -ri..=ri {
                        if *window == MeanWindow::Square || dx * dx + dy * dy <= max_d2 {
                            offsets.push((dx, dy, 1.0));
                        }
                    }
                }
                r
            }
            KernelSpec::Donut {
                radius,
                inner_radius,
            } => {
                let outer = radius.to_cells(cell_size)?;
                let inner = match inner_radius {
                    Some(KernelRadius::Cells(n)) => *n,
                    Some(r @ KernelRadius::Distance(_)) => r.to_cells(cell_size)?,
                    None => outer - 1,
                };
                if inner >= outer {
                    return Err(ConfigError::InvalidDonut { inner, outer });
                }
                let ri = outer as isize;
                for dy in -ri..=ri {
                    for dx in -ri..=ri {
                        let d = dx.abs().max(dy.abs()) as usize;
                        if d > inner {
                            offsets.push((dx, dy, 1.0));
                        }
                    }
                }
                outer
            }
            KernelSpec::Gaussian { radius, sigma } | KernelSpec::InverseGaussian { radius, sigma } => {
                if !sigma.is_finite() || *sigma <= 0.0 {
                    return Err(ConfigError::InvalidSigma(*sigma));
                }
                let r = radius.to_cells(cell_size)?;
                let s = radius.sigma_in_cells(*sigma, cell_size);
                let inverse = matches!(spec, KernelSpec::InverseGaussian { .. });
                let ri = r as isize;
                for dy in -ri..=ri {
                    for dx in -ri..=ri {
                        let g = (-((dx * dx + dy * dy) as f64) / (2.0 * s * s)).exp();
                        let w = if inverse { 1.0 - g } else { g };
                        if w > 0.0 {
                            offsets.push((dx, dy, w));
                        }
                    }
                }
                r
            }
            KernelSpec::FourDirectionEdge { radius } | KernelSpec::EightDirectionEdge { radius } => {
                let r = radius.to_cells(cell_size)?;
                let ri = r as isize;
                for (dx, dy) in [(0, -ri), (-ri, 0), (ri, 0), (0, ri)] {
                    offsets.push((dx, dy, 1.0));
                }
                if matches!(spec, KernelSpec::EightDirectionEdge { .. }) {
                    for (dx, dy) in [(-ri, -ri), (ri, -ri), (-ri, ri), (ri, ri)] {
                        offsets.push((dx, dy, 1.0));
                    }
                }
                r
            }
        };

        let total: f64 = offsets.iter().map(|o| o.2).sum();
        if total <= 0.0 {
            return Err(ConfigError::InvalidRadius(
                "kernel has no cells with positive weight".to_string(),
            ));
        }
        for o in offsets.iter_mut() {
            o.2 /= total;
        }
        Ok(Kernel { radius, offsets })
    }

    /// Distance, in cells, from the centre to the edge of the window.
    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn offsets(&self) -> &[(isize, isize, f64)] {
        &self.offsets
    }

    /// Weighted mean of the neighbourhood of (row, column). Cells that are off
    /// the grid or nodata are dropped and the remaining weights renormalized.
    /// `None` when no cell remains.
    pub fn reduce(&self, grid: &Grid, row: isize, column: isize) -> Option<f64> {
        self.reduce_with(grid, row, column, |z| z)
    }

    /// Same as `reduce`, applied to `f(z)` of each neighbour.
    pub fn reduce_with<F>(&self, grid: &Grid, row: isize, column: isize, f: F) -> Option<f64>
    where
        F: Fn(f64) -> f64,
    {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for &(dx, dy, w) in &self.offsets {
            if let Some(z) = grid.get(row + dy, column + dx) {
                sum += w * f(z);
                weight += w;
            }
        }
        if weight > 0.0 {
            Some(sum / weight)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cells(n: usize) -> KernelRadius {
        KernelRadius::Cells(n)
    }

    #[test]
    fn distance_rounds_up_to_cells() {
        assert_eq!(KernelRadius::Distance(25.0).to_cells(10.0).unwrap(), 3);
        assert_eq!(KernelRadius::Distance(30.0).to_cells(10.0).unwrap(), 3);
        assert_eq!(KernelRadius::Distance(0.5).to_cells(10.0).unwrap(), 1);
        assert!(KernelRadius::Distance(0.0).to_cells(10.0).is_err());
        assert!(KernelRadius::Distance(f64::NAN).to_cells(10.0).is_err());
        assert!(KernelRadius::Cells(0).to_cells(10.0).is_err());
    }

    #[test]
    fn adjacent_connectivity() {
        let k8 = Kernel::build(&KernelSpec::default(), 1.0).unwrap();
        assert_eq!(k8.offsets().len(), 8);
        let k4 = Kernel::build(
            &KernelSpec::Adjacent {
                connectivity: Connectivity::Four,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(k4.offsets().len(), 4);
        assert!(k8.offsets().iter().all(|o| (o.0, o.1) != (0, 0)));
    }

    #[test]
    fn mean_windows() {
        let square = Kernel::build(
            &KernelSpec::Mean {
                radius: cells(2),
                window: MeanWindow::Square,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(square.offsets().len(), 25);
        let circle = Kernel::build(
            &KernelSpec::Mean {
                radius: cells(2),
                window: MeanWindow::Circle,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(circle.offsets().len(), 13);
        let total: f64 = circle.offsets().iter().map(|o| o.2).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn donut_is_the_outer_ring_by_default() {
        let k = Kernel::build(
            &KernelSpec::Donut {
                radius: cells(2),
                inner_radius: None,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(k.offsets().len(), 16);
        let thick = Kernel::build(
            &KernelSpec::Donut {
                radius: cells(2),
                inner_radius: Some(cells(0)),
            },
            1.0,
        )
        .unwrap();
        assert_eq!(thick.offsets().len(), 24);
        assert!(matches!(
            Kernel::build(
                &KernelSpec::Donut {
                    radius: cells(2),
                    inner_radius: Some(cells(2)),
                },
                1.0
            ),
            Err(ConfigError::InvalidDonut { inner: 2, outer: 2 })
        ));
    }

    #[test]
    fn edge_kernels() {
        let four = Kernel::build(&KernelSpec::FourDirectionEdge { radius: cells(3) }, 1.0).unwrap();
        let mut got: Vec<(isize, isize)> = four.offsets().iter().map(|o| (o.0, o.1)).collect();
        got.sort();
        assert_eq!(got, vec![(-3, 0), (0, -3), (0, 3), (3, 0)]);
        let eight = Kernel::build(&KernelSpec::EightDirectionEdge { radius: cells(3) }, 1.0).unwrap();
        assert_eq!(eight.offsets().len(), 8);
        assert!(eight.offsets().iter().all(|o| o.0.abs().max(o.1.abs()) == 3));
    }

    #[test]
    fn gaussian_weights() {
        let k = Kernel::build(
            &KernelSpec::Gaussian {
                radius: cells(1),
                sigma: 1.0,
            },
            1.0,
        )
        .unwrap();
        let centre = k.offsets().iter().find(|o| o.0 == 0 && o.1 == 0).unwrap().2;
        let corner = k.offsets().iter().find(|o| o.0 == 1 && o.1 == 1).unwrap().2;
        assert_relative_eq!(centre, 0.20417996, epsilon = 1e-7);
        assert_relative_eq!(corner, 0.07511361, epsilon = 1e-7);

        let inv = Kernel::build(
            &KernelSpec::InverseGaussian {
                radius: cells(1),
                sigma: 1.0,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(inv.offsets().len(), 8);
        assert!(Kernel::build(
            &KernelSpec::Gaussian {
                radius: cells(1),
                sigma: 0.0
            },
            1.0
        )
        .is_err());
    }

    #[test]
    fn sigma_follows_radius_unit() {
        let by_distance = Kernel::build(
            &KernelSpec::Gaussian {
                radius: KernelRadius::Distance(20.0),
                sigma: 10.0,
            },
            10.0,
        )
        .unwrap();
        let by_cells = Kernel::build(
            &KernelSpec::Gaussian {
                radius: cells(2),
                sigma: 1.0,
            },
            10.0,
        )
        .unwrap();
        assert_eq!(by_distance, by_cells);
    }

    #[test]
    fn scaling() {
        let base = KernelSpec::Gaussian {
            radius: KernelRadius::Distance(10.0),
            sigma: 2.0,
        };
        assert_eq!(
            base.scaled(3).unwrap(),
            KernelSpec::Gaussian {
                radius: KernelRadius::Distance(30.0),
                sigma: 6.0
            }
        );
        assert_eq!(
            KernelSpec::default().scaled(2),
            Err(ConfigError::AdjacentInMultipleMode)
        );
    }

    #[test]
    fn reduce_skips_missing_cells() {
        let g = Grid::from_rows(
            &[
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, -1.0],
                vec![7.0, 8.0, 9.0],
            ],
            1.0,
            -1.0,
        )
        .unwrap();
        let k = Kernel::build(&KernelSpec::default(), 1.0).unwrap();
        // neighbours of the centre without the nodata cell
        assert_relative_eq!(k.reduce(&g, 1, 1).unwrap(), 34.0 / 7.0, epsilon = 1e-12);
        // corner: only three neighbours are on the grid
        assert_relative_eq!(k.reduce(&g, 0, 0).unwrap(), (2.0 + 4.0 + 5.0) / 3.0, epsilon = 1e-12);
        let sq = k.reduce_with(&g, 0, 0, |z| (z - 1.0) * (z - 1.0)).unwrap();
        assert_relative_eq!(sq, (1.0 + 9.0 + 16.0) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn reduce_without_valid_cells() {
        let g = Grid::filled(1, 1, 1.0, 5.0, -1.0).unwrap();
        let k = Kernel::build(&KernelSpec::default(), 1.0).unwrap();
        assert_eq!(k.reduce(&g, 0, 0), None);
    }

    #[test]
    fn kernel_spec_json() {
        let spec: KernelSpec =
            serde_json::from_str(r#"{ "shape": "mean", "radius": { "cells": 2 } }"#).unwrap();
        assert_eq!(
            spec,
            KernelSpec::Mean {
                radius: cells(2),
                window: MeanWindow::Square
            }
        );
        let adj: KernelSpec = serde_json::from_str(r#"{ "shape": "adjacent" }"#).unwrap();
        assert_eq!(adj, KernelSpec::default());
    }
}
