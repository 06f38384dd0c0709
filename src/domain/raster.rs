use crate::domain::model::Crs;
use geo::{coord, Coord, Rect};
use std::ops::Range;

/// North-up population grid. `origin` is the outer top-left corner of the
/// first cell; rows run southwards, values are row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub origin: Coord<f64>,
    pub cell_width: f64,
    pub cell_height: f64,
    pub cols: usize,
    pub rows: usize,
    pub values: Vec<f64>,
    pub nodata: Option<f64>,
    pub crs: Crs,
}

impl RasterGrid {
    /// Rejects grids whose layout cannot be trusted.
    pub fn check(&self) -> Result<(), String> {
        if self.cols == 0 || self.rows == 0 {
            return Err("raster has no cells".to_string());
        }
        if !(self.cell_width > 0.0 && self.cell_height > 0.0) {
            return Err(format!(
                "cell size must be positive, got {} x {}",
                self.cell_width, self.cell_height
            ));
        }
        if !(self.origin.x.is_finite() && self.origin.y.is_finite()) {
            return Err("raster origin is not finite".to_string());
        }
        let expected = self.cols * self.rows;
        if self.values.len() != expected {
            return Err(format!(
                "expected {} values for {}x{} grid, found {}",
                expected,
                self.cols,
                self.rows,
                self.values.len()
            ));
        }
        Ok(())
    }

    /// Cell value, or `None` for no-data. Negative and non-finite values
    /// count as no-data.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        let value = *self.values.get(row * self.cols + col)?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        match self.nodata {
            Some(sentinel) if value == sentinel => None,
            _ => Some(value),
        }
    }

    /// Corners of a cell in the raster's own CRS, counter-clockwise from
    /// the bottom-left.
    pub fn cell_corners(&self, row: usize, col: usize) -> [Coord<f64>; 4] {
        let x0 = self.origin.x + col as f64 * self.cell_width;
        let x1 = x0 + self.cell_width;
        let y1 = self.origin.y - row as f64 * self.cell_height;
        let y0 = y1 - self.cell_height;
        [
            coord! { x: x0, y: y0 },
            coord! { x: x1, y: y0 },
            coord! { x: x1, y: y1 },
            coord! { x: x0, y: y1 },
        ]
    }

    pub fn extent(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.origin.x, y: self.origin.y - self.rows as f64 * self.cell_height },
            coord! { x: self.origin.x + self.cols as f64 * self.cell_width, y: self.origin.y },
        )
    }

    /// Row and column ranges of the cells touching `bounds`, padded by one
    /// cell; `None` when `bounds` misses the grid.
    pub fn window(&self, bounds: Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let extent = self.extent();
        if bounds.max().x < extent.min().x
            || bounds.min().x > extent.max().x
            || bounds.max().y < extent.min().y
            || bounds.min().y > extent.max().y
        {
            return None;
        }

        let col_of = |x: f64| ((x - self.origin.x) / self.cell_width).floor();
        let row_of = |y: f64| ((self.origin.y - y) / self.cell_height).floor();
        let clamp = |v: f64, len: usize| v.max(0.0).min(len as f64) as usize;

        let col_start = clamp(col_of(bounds.min().x) - 1.0, self.cols);
        let col_end = clamp(col_of(bounds.max().x) + 2.0, self.cols);
        let row_start = clamp(row_of(bounds.max().y) - 1.0, self.rows);
        let row_end = clamp(row_of(bounds.min().y) + 2.0, self.rows);

        if col_start >= col_end || row_start >= row_end {
            return None;
        }
        Some((row_start..row_end, col_start..col_end))
    }
}
