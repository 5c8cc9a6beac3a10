//! Preview windows cut from large elevation grids.

use topo_raster::Grid;

use crate::error::{ConfigError, Result};

/// Returns a window of at most `max_rows` x `max_columns` cells of `grid`.
///
/// A grid that already fits is returned whole. Otherwise the centre window and
/// the four corner windows (lower-left, lower-right, upper-left, upper-right,
/// in that order) are cut out and the one with the largest share of valid
/// cells is kept; the earlier candidate wins a tie. The window keeps its
/// position in the source georeference.
pub fn sample_window(grid: &Grid, max_rows: usize, max_columns: usize) -> Result<Grid> {
    if max_rows == 0 || max_columns == 0 {
        return Err(ConfigError::InvalidPreview {
            rows: max_rows,
            columns: max_columns,
        }
        .into());
    }
    let (rows, columns) = (grid.configs.rows, grid.configs.columns);
    if rows <= max_rows && columns <= max_columns {
        return Ok(grid.clone());
    }
    let (wr, wc) = (max_rows.min(rows), max_columns.min(columns));
    let (last_row, last_column) = (rows - wr, columns - wc);
    let origins = [
        (last_row / 2, last_column / 2),
        (last_row, 0),
        (last_row, last_column),
        (0, 0),
        (0, last_column),
    ];

    let mut best: Option<(f64, Grid)> = None;
    for (row, column) in origins {
        let window = grid.sub_grid(row, column, wr, wc)?;
        let fraction = window.num_valid_cells() as f64 / window.num_cells() as f64;
        let better = match &best {
            Some((f, _)) => fraction > *f,
            None => true,
        };
        if better {
            best = Some((fraction, window));
        }
    }
    match best {
        Some((fraction, window)) => {
            tracing::debug!(
                rows = wr,
                columns = wc,
                "preview window with {:.1}% valid cells",
                fraction * 100.0
            );
            Ok(window)
        }
        None => Ok(grid.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopoError;

    fn grid_with_nodata(nodata_cells: &[(isize, isize)]) -> Grid {
        let mut g = Grid::filled(6, 6, 1.0, 5.0, -9999.0).unwrap();
        for &(r, c) in nodata_cells {
            g.set_value(r, c, -9999.0);
        }
        g.update_min_max();
        g
    }

    #[test]
    fn small_grid_is_returned_whole() {
        let g = grid_with_nodata(&[]);
        assert_eq!(sample_window(&g, 6, 10).unwrap(), g);
    }

    #[test]
    fn centre_wins_ties() {
        let mut g = grid_with_nodata(&[]);
        for r in 0..6 {
            for c in 0..6 {
                g.set_value(r, c, (r * 6 + c) as f64);
            }
        }
        let w = sample_window(&g, 2, 2).unwrap();
        assert_eq!((w.configs.rows, w.configs.columns), (2, 2));
        assert_eq!(w.get_value(0, 0), g.get_value(2, 2));
    }

    #[test]
    fn most_complete_window_wins() {
        // nodata in the centre and in every corner except the upper right
        let g = grid_with_nodata(&[(2, 2), (3, 3), (5, 0), (5, 5), (0, 0)]);
        let w = sample_window(&g, 3, 3).unwrap();
        assert_eq!(w.num_valid_cells(), 9);
        assert_eq!(w.configs.west, g.configs.west + 3.0);
        assert_eq!(w.configs.north, g.configs.north);
    }

    #[test]
    fn zero_sized_window_is_rejected() {
        let g = grid_with_nodata(&[]);
        assert!(matches!(
            sample_window(&g, 0, 3),
            Err(TopoError::Config(ConfigError::InvalidPreview { .. }))
        ));
    }
}
