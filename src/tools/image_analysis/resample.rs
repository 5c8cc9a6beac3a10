/*
This tool is part of the topo_maps terrain visualization library.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

use std::f64;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use topo_common::utils::get_formatted_elapsed_time;
use topo_raster::{Grid, GridConfigs};

use crate::error::{ConfigError, DataError, Result};
use crate::progress::CancelToken;
use crate::tools::{compute_rows, TopoTool};

/// The cell size a grid is resampled to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TargetResolution {
    /// An explicit cell size, in the grid's horizontal units.
    Absolute(f64),
    /// The source cell size multiplied by an integer factor.
    Factor(u32),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMethod {
    NearestNeighbour,
    #[default]
    Bilinear,
    Cubic,
    CubicSpline,
}

impl TargetResolution {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match *self {
            TargetResolution::Absolute(r) if !r.is_finite() || r <= 0.0 => {
                Err(ConfigError::InvalidResolution(r))
            }
            TargetResolution::Factor(0) => Err(ConfigError::InvalidFactor(0)),
            _ => Ok(()),
        }
    }

    /// New x and y resolutions for `configs`, or `None` when the grid already
    /// has the target resolution.
    fn resolve(&self, configs: &GridConfigs) -> std::result::Result<Option<(f64, f64)>, ConfigError> {
        self.validate()?;
        match *self {
            TargetResolution::Factor(1) => Ok(None),
            TargetResolution::Factor(n) => Ok(Some((
                configs.resolution_x * n as f64,
                configs.resolution_y * n as f64,
            ))),
            TargetResolution::Absolute(r) => {
                let current = configs.cell_size();
                if (r - current).abs() <= current * 1e-9 {
                    Ok(None)
                } else if r < current {
                    Err(ConfigError::FinerThanSource {
                        target: r,
                        source_res: current,
                    })
                } else {
                    Ok(Some((r, r)))
                }
            }
        }
    }
}

/// Coarsens a grid to a new cell size. The output covers the same extent,
/// anchored at the north-west corner, with `round(extent / cell size)` rows and
/// columns. Each output cell takes the value interpolated at its centre.
///
/// - *nearest neighbour*: the source cell containing the centre.
/// - *bilinear*: the four surrounding cells; nodata if any of them with a
///   non-zero weight is nodata.
/// - *cubic*: 4x4 cubic convolution (Keys, 1981, a = -0.5), applied along the
///   rows and then along the column. A missing outer sample is extrapolated
///   linearly from the two inner ones; a missing inner sample gives nodata.
/// - *cubic spline*: natural cubic splines fitted over each run of valid cells
///   of a row, then over each intermediate column. Nodata breaks a run.
///
/// Samples beyond the grid edge are clamped to the edge cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Resample {
    pub target: TargetResolution,
    pub method: ResampleMethod,
}

/// Continuous source position (in cell-centre units) of every output centre
/// along one axis, clamped to the source extent.
fn source_positions(n_out: usize, n_src: usize, res_out: f64, res_src: f64) -> Vec<f64> {
    let max = (n_src - 1) as f64;
    (0..n_out)
        .map(|i| ((i as f64 + 0.5) * res_out / res_src - 0.5).clamp(0.0, max))
        .collect()
}

fn clamp_index(i: isize, n: isize) -> isize {
    i.max(0).min(n - 1)
}

/// Keys' cubic convolution kernel with a = -0.5.
fn keys_weight(x: f64) -> f64 {
    const A: f64 = -0.5;
    let x = x.abs();
    if x <= 1.0 {
        (A + 2.0) * x * x * x - (A + 3.0) * x * x + 1.0
    } else if x < 2.0 {
        A * x * x * x - 5.0 * A * x * x + 8.0 * A * x - 4.0 * A
    } else {
        0.0
    }
}

/// Cubic convolution of four samples at fraction `t` between the two inner
/// ones.
fn cubic_1d(s: [Option<f64>; 4], t: f64) -> Option<f64> {
    let p1 = s[1]?;
    let p2 = match s[2] {
        Some(v) => v,
        // zero weight at t = 0
        None if t == 0.0 => p1,
        None => return None,
    };
    let p0 = s[0].unwrap_or(2.0 * p1 - p2);
    let p3 = s[3].unwrap_or(2.0 * p2 - p1);
    Some(
        p0 * keys_weight(t + 1.0)
            + p1 * keys_weight(t)
            + p2 * keys_weight(1.0 - t)
            + p3 * keys_weight(2.0 - t),
    )
}

/// A natural cubic spline through every run of valid values of a line, with
/// unit spacing. Adjacent valid values always belong to the same run.
struct SplineLine {
    values: Vec<Option<f64>>,
    second: Vec<f64>,
}

impl SplineLine {
    fn new(values: Vec<Option<f64>>) -> SplineLine {
        let n = values.len();
        let mut second = vec![0f64; n];
        let mut start = 0;
        while start < n {
            if values[start].is_none() {
                start += 1;
                continue;
            }
            let mut end = start;
            while end + 1 < n && values[end + 1].is_some() {
                end += 1;
            }
            let run: Vec<f64> = values[start..=end].iter().flatten().copied().collect();
            let m = natural_second_derivatives(&run);
            second[start..=end].copy_from_slice(&m);
            start = end + 1;
        }
        SplineLine { values, second }
    }

    fn eval(&self, p: f64) -> Option<f64> {
        let i = p.floor() as usize;
        let t = p - i as f64;
        if t == 0.0 || i + 1 >= self.values.len() {
            return self.values.get(i).copied().flatten();
        }
        let (y0, y1) = (self.values[i]?, self.values[i + 1]?);
        let (m0, m1) = (self.second[i], self.second[i + 1]);
        let u = 1.0 - t;
        Some(u * y0 + t * y1 + ((u * u * u - u) * m0 + (t * t * t - t) * m1) / 6.0)
    }
}

/// Second derivatives of the natural cubic spline through `y` (unit spacing),
/// solved with the Thomas algorithm:
/// `M[i-1] + 4 M[i] + M[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1])`, `M[0] = M[n-1] = 0`.
fn natural_second_derivatives(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let mut m = vec![0f64; n];
    if n < 3 {
        return m;
    }
    let k = n - 2;
    let mut c_prime = vec![0f64; k];
    let mut d_prime = vec![0f64; k];
    for j in 0..k {
        let i = j + 1;
        let d = 6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]);
        if j == 0 {
            c_prime[0] = 1.0 / 4.0;
            d_prime[0] = d / 4.0;
        } else {
            let denom = 4.0 - c_prime[j - 1];
            c_prime[j] = 1.0 / denom;
            d_prime[j] = (d - d_prime[j - 1]) / denom;
        }
    }
    m[k] = d_prime[k - 1];
    for j in (0..k - 1).rev() {
        m[j + 1] = d_prime[j] - c_prime[j] * m[j + 2];
    }
    m
}

impl Resample {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.target.validate()
    }
}

impl TopoTool for Resample {
    fn get_tool_name(&self) -> String {
        "Resample".to_string()
    }

    fn get_tool_description(&self) -> String {
        "Coarsens a grid to a new cell size.".to_string()
    }

    #[tracing::instrument(skip_all, name = "resample")]
    fn run(&self, input: &Grid, cancel: &CancelToken) -> Result<Grid> {
        if input.is_empty() {
            return Err(DataError::EmptyGrid.into());
        }
        let (res_x, res_y) = match self.target.resolve(&input.configs)? {
            Some(r) => r,
            None => {
                tracing::debug!("grid already at the target resolution");
                return Ok(input.clone());
            }
        };
        let start = Instant::now();

        let src = &input.configs;
        let rows_out = (((src.north - src.south) / res_y).round() as usize).max(1);
        let columns_out = (((src.east - src.west) / res_x).round() as usize).max(1);
        let configs = src.with_resolution(rows_out, columns_out, res_x, res_y);

        let row_pos = source_positions(rows_out, src.rows, res_y, src.resolution_y);
        let col_pos = source_positions(columns_out, src.columns, res_x, src.resolution_x);
        let nodata = input.nodata();
        let rows_src = input.rows();
        let columns_src = input.columns();

        let output = match self.method {
            ResampleMethod::NearestNeighbour => compute_rows(&configs, cancel, |row| {
                let r = row_pos[row as usize].round() as isize;
                col_pos
                    .iter()
                    .map(|&c| input.get_value(r, c.round() as isize))
                    .collect()
            })?,
            ResampleMethod::Bilinear => compute_rows(&configs, cancel, |row| {
                let p = row_pos[row as usize];
                let r0 = p.floor() as isize;
                let r1 = clamp_index(r0 + 1, rows_src);
                let fr = p - r0 as f64;
                col_pos
                    .iter()
                    .map(|&q| {
                        let c0 = q.floor() as isize;
                        let c1 = clamp_index(c0 + 1, columns_src);
                        let fc = q - c0 as f64;
                        let samples = [
                            (r0, c0, (1.0 - fr) * (1.0 - fc)),
                            (r0, c1, (1.0 - fr) * fc),
                            (r1, c0, fr * (1.0 - fc)),
                            (r1, c1, fr * fc),
                        ];
                        let mut z = 0.0;
                        for (r, c, w) in samples {
                            if w == 0.0 {
                                continue;
                            }
                            match input.get(r, c) {
                                Some(v) => z += w * v,
                                None => return nodata,
                            }
                        }
                        z
                    })
                    .collect()
            })?,
            ResampleMethod::Cubic => compute_rows(&configs, cancel, |row| {
                let p = row_pos[row as usize];
                let r = p.floor() as isize;
                let tr = p - r as f64;
                col_pos
                    .iter()
                    .map(|&q| {
                        let c = q.floor() as isize;
                        let tc = q - c as f64;
                        let mut column = [None; 4];
                        for (k, dr) in (-1..=2).enumerate() {
                            let rr = clamp_index(r + dr, rows_src);
                            let mut s = [None; 4];
                            for (n, dc) in (-1..=2).enumerate() {
                                s[n] = input.get(rr, clamp_index(c + dc, columns_src));
                            }
                            column[k] = cubic_1d(s, tc);
                        }
                        cubic_1d(column, tr).unwrap_or(nodata)
                    })
                    .collect()
            })?,
            ResampleMethod::CubicSpline => {
                // along each source row first
                let intermediate: Vec<Vec<Option<f64>>> = (0..rows_src)
                    .into_par_iter()
                    .map(|row| {
                        cancel.check()?;
                        let line = SplineLine::new(
                            (0..columns_src).map(|col| input.get(row, col)).collect(),
                        );
                        Ok(col_pos.iter().map(|&q| line.eval(q)).collect::<Vec<Option<f64>>>())
                    })
                    .collect::<Result<Vec<Vec<Option<f64>>>>>()?;
                // then along each intermediate column
                let columns: Vec<SplineLine> = (0..columns_out)
                    .into_par_iter()
                    .map(|col| SplineLine::new(intermediate.iter().map(|r| r[col]).collect()))
                    .collect();
                compute_rows(&configs, cancel, |row| {
                    let p = row_pos[row as usize];
                    columns.iter().map(|line| line.eval(p).unwrap_or(nodata)).collect()
                })?
            }
        };

        tracing::debug!(
            rows = rows_out,
            columns = columns_out,
            "resampled to {} in {}",
            configs.cell_size(),
            get_formatted_elapsed_time(start)
        );
        Ok(output)
    }
}
