use super::*;
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const DEFAULT_NODATA: f64 = -9999.0;

/// Reads an ESRI ASCII grid from disk.
pub fn read_arcascii(file_name: &Path) -> Result<Grid, RasterError> {
    let f = File::open(file_name)?;
    parse_arcascii(BufReader::new(f))
}

/// Parses an ESRI ASCII grid. Header keys are case-insensitive and may be
/// separated from their value by spaces or tabs. Either the corner or the
/// centre form of the lower-left origin is accepted.
pub fn parse_arcascii<R: BufRead>(reader: R) -> Result<Grid, RasterError> {
    let mut rows: Option<usize> = None;
    let mut columns: Option<usize> = None;
    let mut cell_size: Option<f64> = None;
    let mut xllcorner: Option<f64> = None;
    let mut yllcorner: Option<f64> = None;
    let mut xllcenter: Option<f64> = None;
    let mut yllcenter: Option<f64> = None;
    let mut nodata = DEFAULT_NODATA;
    let mut data: Vec<f64> = vec![];

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = i + 1;
        let vec: Vec<&str> = line.split_whitespace().collect();
        if vec.is_empty() {
            continue;
        }
        let key = vec[0].to_lowercase();
        if key.starts_with(|c: char| c.is_ascii_alphabetic()) && vec.len() == 2 {
            let value = vec[1];
            match key.as_str() {
                "nrows" => rows = Some(parse_count(value, line_num)?),
                "ncols" => columns = Some(parse_count(value, line_num)?),
                "xllcorner" => xllcorner = Some(parse_num(value, line_num)?),
                "yllcorner" => yllcorner = Some(parse_num(value, line_num)?),
                "xllcenter" => xllcenter = Some(parse_num(value, line_num)?),
                "yllcenter" => yllcenter = Some(parse_num(value, line_num)?),
                "cellsize" => cell_size = Some(parse_num(value, line_num)?),
                "nodata_value" => nodata = parse_num(value, line_num)?,
                _ => {
                    return Err(RasterError::Parse {
                        line: line_num,
                        message: format!("unrecognized header entry '{}'", vec[0]),
                    })
                }
            }
        } else {
            // it's a data line
            for val in vec {
                data.push(parse_num(val, line_num)?);
            }
        }
    }

    let rows = rows.ok_or(RasterError::MissingHeader("nrows"))?;
    let columns = columns.ok_or(RasterError::MissingHeader("ncols"))?;
    let cell_size = cell_size.ok_or(RasterError::MissingHeader("cellsize"))?;
    if rows.checked_mul(columns).is_none() {
        return Err(RasterError::TooManyCells { rows, columns });
    }
    let (west, south) = match (xllcorner, yllcorner, xllcenter, yllcenter) {
        (Some(x), Some(y), _, _) => (x, y),
        (_, _, Some(x), Some(y)) => (x - 0.5 * cell_size, y - 0.5 * cell_size),
        _ => return Err(RasterError::MissingHeader("xllcorner/yllcorner")),
    };

    let configs = GridConfigs {
        rows,
        columns,
        nodata,
        north: south + rows as f64 * cell_size,
        south,
        east: west + columns as f64 * cell_size,
        west,
        resolution_x: cell_size,
        resolution_y: cell_size,
        ..Default::default()
    };
    Grid::new(configs, data)
}

fn parse_num(s: &str, line: usize) -> Result<f64, RasterError> {
    s.parse::<f64>().map_err(|e| RasterError::Parse {
        line,
        message: format!("'{}': {}", s, e),
    })
}

fn parse_count(s: &str, line: usize) -> Result<usize, RasterError> {
    s.parse::<usize>().map_err(|e| RasterError::Parse {
        line,
        message: format!("'{}': {}", s, e),
    })
}

/// Writes a grid to disk as an ESRI ASCII grid.
pub fn write_arcascii(grid: &Grid, file_name: &Path) -> Result<(), RasterError> {
    let f = File::create(file_name)?;
    let mut writer = BufWriter::new(f);
    write_arcascii_to(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Writes a grid as ESRI ASCII text. NaN cells are written as the nodata value.
pub fn write_arcascii_to<W: Write>(grid: &Grid, writer: &mut W) -> Result<(), RasterError> {
    let configs = &grid.configs;
    writeln!(writer, "NCOLS {}", configs.columns)?;
    writeln!(writer, "NROWS {}", configs.rows)?;
    writeln!(writer, "XLLCORNER {}", configs.west)?;
    writeln!(writer, "YLLCORNER {}", configs.south)?;
    writeln!(writer, "CELLSIZE {}", configs.cell_size())?;
    writeln!(writer, "NODATA_VALUE {}", configs.nodata)?;

    for row in 0..grid.rows() {
        let line = grid
            .get_row_data(row)
            .iter()
            .map(|&z| {
                if z.is_nan() {
                    format!("{}", configs.nodata)
                } else {
                    format!("{}", z)
                }
            })
            .collect::<Vec<String>>()
            .join(" ");
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}
