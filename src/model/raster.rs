//! Read-only access to ESRI ASCII grid rasters.
//!
//! The six-line header carries ncols, nrows, the lower-left anchor (corner or
//! center), the cell size and the NODATA sentinel; the body is
//! whitespace-separated cell values in row-major order. NODATA cells are
//! excluded from the location set, and all rasters loaded for one simulation
//! must agree on dimensions and NODATA mask.

use std::path::Path;

use crate::model::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct AscGrid {
    pub nrows: usize,
    pub ncols: usize,
    pub xll: f64,
    pub yll: f64,
    /// True when the anchor names the cell center rather than the corner.
    pub center_anchored: bool,
    pub cellsize: f64,
    pub nodata_value: f64,
    data: Vec<f64>,
}

impl AscGrid {
    pub fn from_str(content: &str) -> Result<Self> {
        let mut tokens = content.split_whitespace();

        let mut ncols: Option<usize> = None;
        let mut nrows: Option<usize> = None;
        let mut xll: Option<(f64, bool)> = None;
        let mut yll: Option<(f64, bool)> = None;
        let mut cellsize: Option<f64> = None;
        let mut nodata_value = 0.0;

        for _ in 0..6 {
            let field = tokens
                .next()
                .ok_or_else(|| SimError::raster("truncated header"))?
                .to_ascii_uppercase();
            let value = tokens
                .next()
                .ok_or_else(|| SimError::raster(format!("header field {field} has no value")))?;
            let parse = |v: &str| {
                v.parse::<f64>()
                    .map_err(|_| SimError::raster(format!("invalid value for {field}: {v}")))
            };
            match field.as_str() {
                "NCOLS" => ncols = Some(parse(value)? as usize),
                "NROWS" => nrows = Some(parse(value)? as usize),
                "XLLCORNER" => xll = Some((parse(value)?, false)),
                "YLLCORNER" => yll = Some((parse(value)?, false)),
                "XLLCENTER" => xll = Some((parse(value)?, true)),
                "YLLCENTER" => yll = Some((parse(value)?, true)),
                "CELLSIZE" => cellsize = Some(parse(value)?),
                "NODATA_VALUE" => nodata_value = parse(value)?,
                other => {
                    return Err(SimError::raster(format!("unknown header field: {other}")));
                }
            }
        }

        let ncols = ncols.ok_or_else(|| SimError::raster("number of columns is not set"))?;
        let nrows = nrows.ok_or_else(|| SimError::raster("number of rows is not set"))?;
        let cellsize = cellsize.ok_or_else(|| SimError::raster("cell size is not set"))?;
        let (xll, x_center) =
            xll.ok_or_else(|| SimError::raster("no x coordinate provided for raster anchor"))?;
        let (yll, y_center) =
            yll.ok_or_else(|| SimError::raster("no y coordinate provided for raster anchor"))?;
        if x_center != y_center {
            return Err(SimError::raster("conflicting raster anchor coordinates"));
        }

        let mut data = Vec::with_capacity(nrows * ncols);
        for token in tokens {
            let value = token
                .parse::<f64>()
                .map_err(|_| SimError::raster(format!("invalid cell value: {token}")))?;
            data.push(value);
        }
        if data.len() != nrows * ncols {
            return Err(SimError::raster(format!(
                "expected {} cells, found {}",
                nrows * ncols,
                data.len()
            )));
        }

        Ok(Self {
            nrows,
            ncols,
            xll,
            yll,
            center_anchored: x_center,
            cellsize,
            nodata_value,
            data,
        })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_str(&content)
    }

    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.ncols + col]
    }

    #[must_use]
    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.value(row, col) == self.nodata_value
    }

    /// Iterate over data cells as (row, col, value), skipping NODATA.
    pub fn data_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |row| {
            (0..self.ncols).filter_map(move |col| {
                let v = self.value(row, col);
                (v != self.nodata_value).then_some((row, col, v))
            })
        })
    }

    /// Dimensions and NODATA mask must agree across every layer of one
    /// simulation.
    pub fn check_same_shape(&self, other: &AscGrid) -> Result<()> {
        if self.nrows != other.nrows || self.ncols != other.ncols {
            return Err(SimError::raster(format!(
                "raster dimensions differ: {}x{} vs {}x{}",
                self.nrows, self.ncols, other.nrows, other.ncols
            )));
        }
        for row in 0..self.nrows {
            for col in 0..self.ncols {
                if self.is_nodata(row, col) != other.is_nodata(row, col) {
                    return Err(SimError::raster(format!(
                        "NODATA mask differs at ({row}, {col})"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "ncols 3\nnrows 2\nxllcorner 0.0\nyllcorner 0.0\ncellsize 5.0\nNODATA_value -9999\n1 2 -9999\n4 5 6\n";

    #[test]
    fn test_parse_small_grid() {
        let grid = AscGrid::from_str(SMALL).unwrap();
        assert_eq!(grid.nrows, 2);
        assert_eq!(grid.ncols, 3);
        assert_eq!(grid.value(0, 1), 2.0);
        assert!(grid.is_nodata(0, 2));
        assert_eq!(grid.data_cells().count(), 5);
    }

    #[test]
    fn test_truncated_data_rejected() {
        let content = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1 2 3\n";
        assert!(AscGrid::from_str(content).is_err());
    }

    #[test]
    fn test_conflicting_anchor_rejected() {
        let content = "ncols 1\nnrows 1\nxllcorner 0\nyllcenter 0\ncellsize 1\nNODATA_value -9999\n1\n";
        assert!(AscGrid::from_str(content).is_err());
    }

    #[test]
    fn test_mask_mismatch_detected() {
        let a = AscGrid::from_str(SMALL).unwrap();
        let b = AscGrid::from_str(
            "ncols 3\nnrows 2\nxllcorner 0.0\nyllcorner 0.0\ncellsize 5.0\nNODATA_value -9999\n1 2 3\n4 5 6\n",
        )
        .unwrap();
        assert!(a.check_same_shape(&b).is_err());
    }
}
