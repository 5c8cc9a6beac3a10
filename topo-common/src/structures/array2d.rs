/////////////////////////////////////////////
// A generic 2-dimensional array structure //
/////////////////////////////////////////////

use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Raised when an `Array2D` is requested with impossible dimensions.
#[derive(Debug, Error)]
#[error("Only non-negative rows and columns values accepted (got {rows} x {columns}).")]
pub struct ArrayDimensionError {
    pub rows: isize,
    pub columns: isize,
}

/// A simple in-memory 2-D array that is not connected to a file or a
/// georeference. Cell values can be any `Copy` type; reads outside of the
/// array return the `nodata` value and writes outside of it are ignored.
///
/// Example:
///
/// ```
/// use topo_common::structures::Array2D;
/// let mut x: Array2D<f64> = Array2D::new(100, 500, 0f64, -999f64).unwrap();
/// x.set_value(50, 100, 1f64);
/// assert_eq!(x.get_value(50, 100), 1f64);
/// assert_eq!(x.get_value(-1, 100), -999f64);
/// ```
#[derive(Clone, Debug)]
pub struct Array2D<T: Copy> {
    pub columns: isize,
    pub rows: isize,
    data: Vec<T>,
    pub nodata: T,
}

impl<T> Array2D<T>
where
    T: Copy,
{
    /// The constructor function used to create a new Array2D object.
    pub fn new(
        rows: isize,
        columns: isize,
        initial_value: T,
        nodata: T,
    ) -> Result<Array2D<T>, ArrayDimensionError> {
        if rows < 0 || columns < 0 {
            return Err(ArrayDimensionError { rows, columns });
        }
        Ok(Array2D {
            columns,
            rows,
            nodata,
            data: vec![initial_value; (rows * columns) as usize],
        })
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: T) {
        if self.in_bounds(row, column) {
            self.data[(row * self.columns + column) as usize] = value;
        }
    }

    pub fn get_value(&self, row: isize, column: isize) -> T {
        if !self.in_bounds(row, column) {
            return self.nodata;
        }
        self.data[(row * self.columns + column) as usize]
    }

    pub fn set_row_data(&mut self, row: isize, values: Vec<T>) {
        if row < 0 || row >= self.rows {
            return;
        }
        for (column, value) in values.into_iter().enumerate().take(self.columns as usize) {
            self.data[row as usize * self.columns as usize + column] = value;
        }
    }

    pub fn get_row_data(&self, row: isize) -> Vec<T> {
        let columns = self.columns as usize;
        if row >= 0 && row < self.rows {
            let start = row as usize * columns;
            return self.data[start..start + columns].to_vec();
        }
        vec![self.nodata; columns]
    }

    /// Row-major view of every cell.
    pub fn values(&self) -> &[T] {
        &self.data
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn columns(&self) -> isize {
        self.columns
    }

    pub fn rows(&self) -> isize {
        self.rows
    }

    pub fn nodata(&self) -> T {
        self.nodata
    }

    fn in_bounds(&self, row: isize, column: isize) -> bool {
        row >= 0 && column >= 0 && row < self.rows && column < self.columns
    }
}

impl<T: Copy> Index<(isize, isize)> for Array2D<T> {
    type Output = T;

    fn index(&self, index: (isize, isize)) -> &T {
        let (row, column) = index;
        if !self.in_bounds(row, column) {
            return &self.nodata;
        }
        &self.data[(row * self.columns + column) as usize]
    }
}

impl<T: Copy> IndexMut<(isize, isize)> for Array2D<T> {
    fn index_mut(&mut self, index: (isize, isize)) -> &mut T {
        let (row, column) = index;
        if !self.in_bounds(row, column) {
            return &mut self.nodata;
        }
        let idx = row * self.columns + column;
        &mut self.data[idx as usize]
    }
}
