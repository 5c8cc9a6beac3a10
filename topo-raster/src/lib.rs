/*
This library is part of the topo_maps terrain visualization tools.
Created: 18/10/2026
Last Modified: 18/10/2026
License: MIT
*/

mod arcascii_raster;
mod error;

pub use self::arcascii_raster::{parse_arcascii, read_arcascii, write_arcascii, write_arcascii_to};
pub use self::error::RasterError;

use std::f64;
use std::ops::Index;

/// Offsets of the 3x3 window returned by `Grid::window_3x3`, in row-major
/// order: NW, N, NE, W, C, E, SW, S, SE. The cell opposite to index `i` is at
/// `8 - i`.
pub const WINDOW_OFFSETS: [(isize, isize); 9] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 0),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Dimensions, georeferencing and value range of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfigs {
    pub rows: usize,
    pub columns: usize,
    pub nodata: f64,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub resolution_x: f64,
    pub resolution_y: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// Projection description. Opaque to everything that uses the grid.
    pub projection: String,
    pub metadata: Vec<String>,
}

impl Default for GridConfigs {
    fn default() -> GridConfigs {
        GridConfigs {
            rows: 0,
            columns: 0,
            nodata: -32768.0,
            north: f64::NEG_INFINITY,
            south: f64::INFINITY,
            east: f64::NEG_INFINITY,
            west: f64::INFINITY,
            resolution_x: f64::NEG_INFINITY,
            resolution_y: f64::NEG_INFINITY,
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
            projection: String::new(),
            metadata: vec![],
        }
    }
}

impl GridConfigs {
    /// Configs for a grid whose south-west corner sits at the origin.
    pub fn new(rows: usize, columns: usize, cell_size: f64, nodata: f64) -> GridConfigs {
        GridConfigs {
            rows,
            columns,
            nodata,
            north: rows as f64 * cell_size,
            south: 0.0,
            east: columns as f64 * cell_size,
            west: 0.0,
            resolution_x: cell_size,
            resolution_y: cell_size,
            ..Default::default()
        }
    }

    /// Mean of the x and y resolutions.
    pub fn cell_size(&self) -> f64 {
        (self.resolution_x + self.resolution_y) / 2.0
    }

    /// Same north-west anchor, new cell size and dimensions. The east and south
    /// edges follow from the new dimensions.
    pub fn with_resolution(
        &self,
        rows: usize,
        columns: usize,
        resolution_x: f64,
        resolution_y: f64,
    ) -> GridConfigs {
        GridConfigs {
            rows,
            columns,
            resolution_x,
            resolution_y,
            east: self.west + columns as f64 * resolution_x,
            south: self.north - rows as f64 * resolution_y,
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
            ..self.clone()
        }
    }

    /// `None` when rows x columns overflows.
    fn num_cells(&self) -> Option<usize> {
        self.rows.checked_mul(self.columns)
    }

    /// Rejects a cell count that overflows and a resolution that is not
    /// positive and finite.
    fn check(&self) -> Result<usize, RasterError> {
        let n = self.num_cells().ok_or(RasterError::TooManyCells {
            rows: self.rows,
            columns: self.columns,
        })?;
        if !(self.resolution_x.is_finite() && self.resolution_x > 0.0)
            || !(self.resolution_y.is_finite() && self.resolution_y > 0.0)
        {
            return Err(RasterError::InvalidCellSize(self.cell_size()));
        }
        Ok(n)
    }
}

/// An in-memory, single-band grid of `f64` cells with an explicit nodata
/// sentinel. Reads outside of the grid return nodata; NaN cells are always
/// treated as nodata.
///
/// ```
/// use topo_raster::Grid;
/// let mut g = Grid::filled(3, 4, 1.0, 10.0, -9999.0).unwrap();
/// g.set_value(1, 2, 5.0);
/// assert_eq!(g.get_value(1, 2), 5.0);
/// assert_eq!(g.get_value(-1, 0), -9999.0);
/// assert_eq!(g.get(3, 0), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub configs: GridConfigs,
    data: Vec<f64>,
}

impl Index<(isize, isize)> for Grid {
    type Output = f64;

    fn index(&self, index: (isize, isize)) -> &f64 {
        let (row, column) = index;
        match self.cell_index(row, column) {
            Some(i) => &self.data[i],
            None => &self.configs.nodata,
        }
    }
}

impl Grid {
    /// Builds a grid from row-major data. The data length must match the
    /// configured dimensions.
    pub fn new(mut configs: GridConfigs, data: Vec<f64>) -> Result<Grid, RasterError> {
        let expected = configs.check()?;
        if data.len() != expected {
            return Err(RasterError::InvalidDimensions {
                rows: configs.rows,
                columns: configs.columns,
                expected,
                found: data.len(),
            });
        }
        configs.minimum = f64::INFINITY;
        configs.maximum = f64::NEG_INFINITY;
        let mut grid = Grid { configs, data };
        grid.update_min_max();
        Ok(grid)
    }

    /// A grid with every cell set to `value`. Validated like `Grid::new`.
    pub fn filled(
        rows: usize,
        columns: usize,
        cell_size: f64,
        value: f64,
        nodata: f64,
    ) -> Result<Grid, RasterError> {
        let configs = GridConfigs::new(rows, columns, cell_size, nodata);
        let n = configs.check()?;
        Grid::new(configs, vec![value; n])
    }

    /// Builds a grid from nested rows. Every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>], cell_size: f64, nodata: f64) -> Result<Grid, RasterError> {
        let columns = rows.first().map(|r| r.len()).unwrap_or(0);
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        if rows.iter().any(|r| r.len() != columns) {
            return Err(RasterError::InvalidDimensions {
                rows: rows.len(),
                columns,
                expected: rows.len() * columns,
                found: data.len(),
            });
        }
        Grid::new(GridConfigs::new(rows.len(), columns, cell_size, nodata), data)
    }

    /// A nodata-filled grid with the given configs.
    pub fn initialize_using_config(configs: &GridConfigs) -> Result<Grid, RasterError> {
        let mut configs = configs.clone();
        let n = configs.check()?;
        configs.minimum = f64::INFINITY;
        configs.maximum = f64::NEG_INFINITY;
        Ok(Grid {
            data: vec![configs.nodata; n],
            configs,
        })
    }

    pub fn rows(&self) -> isize {
        self.configs.rows as isize
    }

    pub fn columns(&self) -> isize {
        self.configs.columns as isize
    }

    pub fn nodata(&self) -> f64 {
        self.configs.nodata
    }

    pub fn cell_size(&self) -> f64 {
        self.configs.cell_size()
    }

    pub fn num_cells(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when `value` is the nodata sentinel (or NaN).
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || value == self.configs.nodata
    }

    pub fn in_bounds(&self, row: isize, column: isize) -> bool {
        row >= 0 && column >= 0 && row < self.rows() && column < self.columns()
    }

    fn cell_index(&self, row: isize, column: isize) -> Option<usize> {
        if self.in_bounds(row, column) {
            Some(row as usize * self.configs.columns + column as usize)
        } else {
            None
        }
    }

    /// Cell value, or the nodata value when out of bounds.
    pub fn get_value(&self, row: isize, column: isize) -> f64 {
        self[(row, column)]
    }

    /// Cell value when the cell is in bounds and holds data.
    pub fn get(&self, row: isize, column: isize) -> Option<f64> {
        let z = self.cell_index(row, column).map(|i| self.data[i])?;
        if self.is_nodata(z) {
            None
        } else {
            Some(z)
        }
    }

    /// Writes outside of the grid are ignored.
    pub fn set_value(&mut self, row: isize, column: isize, value: f64) {
        if let Some(i) = self.cell_index(row, column) {
            self.data[i] = value;
        }
    }

    pub fn set_row_data(&mut self, row: isize, values: Vec<f64>) {
        if row < 0 || row >= self.rows() {
            return;
        }
        let start = row as usize * self.configs.columns;
        for (column, value) in values.into_iter().enumerate().take(self.configs.columns) {
            self.data[start + column] = value;
        }
    }

    pub fn get_row_data(&self, row: isize) -> Vec<f64> {
        if row >= 0 && row < self.rows() {
            let start = row as usize * self.configs.columns;
            return self.data[start..start + self.configs.columns].to_vec();
        }
        vec![self.configs.nodata; self.configs.columns]
    }

    /// Row-major view of every cell.
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Every cell that holds data, in row-major order.
    pub fn valid_values(&self) -> Vec<f64> {
        self.data
            .iter()
            .copied()
            .filter(|&z| !self.is_nodata(z))
            .collect()
    }

    pub fn num_valid_cells(&self) -> usize {
        self.data.iter().filter(|&&z| !self.is_nodata(z)).count()
    }

    /// Recomputes the minimum and maximum over the valid cells. Both stay at
    /// +/- infinity when there are none.
    pub fn update_min_max(&mut self) {
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for &z in &self.data {
            if !self.is_nodata(z) {
                minimum = minimum.min(z);
                maximum = maximum.max(z);
            }
        }
        self.configs.minimum = minimum;
        self.configs.maximum = maximum;
    }

    /// The nine values centred on (row, column), ordered as in
    /// `WINDOW_OFFSETS`, or `None` when the centre cell is nodata. A missing
    /// neighbour (off the grid or nodata) is mirrored through the centre from
    /// the opposite neighbour, `2 z - z_opposite`, so that gradients at borders
    /// become one-sided. When the opposite is missing too, the centre value is
    /// used.
    pub fn window_3x3(&self, row: isize, column: isize) -> Option<[f64; 9]> {
        let center = self.get(row, column)?;
        let raw: Vec<Option<f64>> = WINDOW_OFFSETS
            .iter()
            .map(|(dr, dc)| self.get(row + dr, column + dc))
            .collect();
        let mut window = [center; 9];
        for i in 0..9 {
            window[i] = match (raw[i], raw[8 - i]) {
                (Some(z), _) => z,
                (None, Some(opposite)) => 2.0 * center - opposite,
                (None, None) => center,
            };
        }
        Some(window)
    }

    /// Copies a window of `rows` x `columns` cells whose top-left cell is at
    /// (row, column). The copy is georeferenced to its position in this grid.
    pub fn sub_grid(
        &self,
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    ) -> Result<Grid, RasterError> {
        if row + rows > self.configs.rows || column + columns > self.configs.columns {
            return Err(RasterError::WindowOutOfBounds {
                row,
                column,
                rows,
                columns,
            });
        }
        let mut configs = self.configs.clone();
        configs.rows = rows;
        configs.columns = columns;
        configs.north = self.configs.north - row as f64 * self.configs.resolution_y;
        configs.south = configs.north - rows as f64 * self.configs.resolution_y;
        configs.west = self.configs.west + column as f64 * self.configs.resolution_x;
        configs.east = configs.west + columns as f64 * self.configs.resolution_x;
        let mut data = Vec::with_capacity(rows * columns);
        for r in row..row + rows {
            let start = r * self.configs.columns + column;
            data.extend_from_slice(&self.data[start..start + columns]);
        }
        Grid::new(configs, data)
    }

    pub fn same_dimensions(&self, other: &Grid) -> bool {
        self.configs.rows == other.configs.rows && self.configs.columns == other.configs.columns
    }

    pub fn get_x_from_column(&self, column: isize) -> f64 {
        self.configs.west + self.configs.resolution_x / 2.0
            + column as f64 * self.configs.resolution_x
    }

    pub fn get_y_from_row(&self, row: isize) -> f64 {
        self.configs.north - self.configs.resolution_y / 2.0 - row as f64 * self.configs.resolution_y
    }

    pub fn get_column_from_x(&self, x: f64) -> isize {
        ((x - self.configs.west) / self.configs.resolution_x).floor() as isize
    }

    pub fn get_row_from_y(&self, y: f64) -> isize {
        ((self.configs.north - y) / self.configs.resolution_y).floor() as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Grid {
        Grid::from_rows(
            &[
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
            ],
            2.0,
            -9999.0,
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_wrong_length() {
        let configs = GridConfigs::new(2, 2, 1.0, -1.0);
        assert!(matches!(
            Grid::new(configs, vec![0.0; 3]),
            Err(RasterError::InvalidDimensions { found: 3, .. })
        ));
    }

    #[test]
    fn new_rejects_bad_cell_size() {
        let configs = GridConfigs::new(1, 1, 0.0, -1.0);
        assert!(Grid::new(configs, vec![0.0]).is_err());
    }

    #[test]
    fn filled_is_validated_like_new() {
        assert!(matches!(
            Grid::filled(2, 2, 0.0, 1.0, -1.0),
            Err(RasterError::InvalidCellSize(_))
        ));
        assert!(matches!(
            Grid::filled(2, 2, f64::NAN, 1.0, -1.0),
            Err(RasterError::InvalidCellSize(_))
        ));
        let g = Grid::filled(2, 3, 1.0, 4.0, -1.0).unwrap();
        assert_eq!((g.configs.minimum, g.configs.maximum), (4.0, 4.0));
        let nodata = Grid::filled(2, 2, 1.0, -1.0, -1.0).unwrap();
        assert_eq!(nodata.configs.minimum, f64::INFINITY);
    }

    #[test]
    fn overflowing_dimensions_are_an_error() {
        let configs = GridConfigs::new(usize::MAX, 2, 1.0, -1.0);
        assert!(matches!(
            Grid::new(configs.clone(), vec![]),
            Err(RasterError::TooManyCells { .. })
        ));
        assert!(Grid::initialize_using_config(&configs).is_err());
    }

    #[test]
    fn min_max_ignore_nodata() {
        let g = Grid::from_rows(&[vec![-9999.0, 3.0], vec![f64::NAN, -2.0]], 1.0, -9999.0).unwrap();
        assert_eq!(g.configs.minimum, -2.0);
        assert_eq!(g.configs.maximum, 3.0);
        assert_eq!(g.num_valid_cells(), 2);
        assert_eq!(g.valid_values(), vec![3.0, -2.0]);
    }

    #[test]
    fn bounds_aware_access() {
        let g = ramp();
        assert_eq!(g.get(1, 1), Some(5.0));
        assert_eq!(g.get(-1, 1), None);
        assert_eq!(g.get_value(3, 3), -9999.0);
        assert_eq!(g[(0, 2)], 3.0);
    }

    #[test]
    fn window_mirrors_missing_neighbours() {
        let g = ramp();
        let w = g.window_3x3(0, 0).unwrap();
        // north row mirrored from the south row
        assert_eq!(w[1], 2.0 * 1.0 - 4.0);
        // north-west corner mirrored from south-east
        assert_eq!(w[0], 2.0 * 1.0 - 5.0);
        assert_eq!(w[5], 2.0);
        assert_eq!(w[7], 4.0);
        let interior = g.window_3x3(1, 1).unwrap();
        assert_eq!(interior, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn window_of_single_cell_is_flat() {
        let g = Grid::filled(1, 1, 1.0, 7.0, -1.0).unwrap();
        assert_eq!(g.window_3x3(0, 0), Some([7.0; 9]));
    }

    #[test]
    fn sub_grid_keeps_georeference() {
        let g = ramp();
        let s = g.sub_grid(1, 1, 2, 2).unwrap();
        assert_eq!(s.values(), &[5.0, 6.0, 8.0, 9.0]);
        assert_relative_eq!(s.configs.north, 4.0);
        assert_relative_eq!(s.configs.west, 2.0);
        assert_relative_eq!(s.get_x_from_column(0), g.get_x_from_column(1));
        assert!(g.sub_grid(2, 2, 2, 1).is_err());
    }

    #[test]
    fn coordinates_round_trip() {
        let g = ramp();
        for row in 0..3 {
            assert_eq!(g.get_row_from_y(g.get_y_from_row(row)), row);
        }
        for col in 0..3 {
            assert_eq!(g.get_column_from_x(g.get_x_from_column(col)), col);
        }
    }
}
