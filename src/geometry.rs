//! Grid geometry shared by every map of a stack
//!
//! The geometry is taken once from a reference map and then passed explicitly
//! to the raster reader (to validate each map) and to the container
//! initializer (to write the coordinate axes).

use crate::errors::{Result, RuNeStackError};
use std::path::Path;

/// North-up raster lattice described by its upper-left corner and cell size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// x coordinate of the outer edge of the first column
    pub x_origin: f64,
    /// y coordinate of the outer edge of the first row
    pub y_origin: f64,
    /// Column step, positive towards the east
    pub cell_width: f64,
    /// Row step; negative when rows run from north to south
    pub cell_height: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridGeometry {
    /// Build a geometry from a GDAL-style affine transform
    /// `[x_origin, x_res, x_rot, y_origin, y_rot, y_res]`. Rotation terms are
    /// ignored.
    pub fn from_geo_transform(geo_transform: [f64; 6], rows: usize, cols: usize) -> Self {
        Self {
            x_origin: geo_transform[0],
            y_origin: geo_transform[3],
            cell_width: geo_transform[1],
            cell_height: geo_transform[5],
            rows,
            cols,
        }
    }

    /// Cell-centre x coordinates, one per column (the `lon` axis)
    pub fn x_axis(&self) -> Vec<f64> {
        cell_centres(self.x_origin, self.cell_width, self.cols)
    }

    /// Cell-centre y coordinates, one per row (the `lat` axis)
    pub fn y_axis(&self) -> Vec<f64> {
        cell_centres(self.y_origin, self.cell_height, self.rows)
    }

    /// `(rows, cols)`, matching the shape of a 2-D grid
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Fail unless a grid read from `path` has this lattice's shape.
    pub fn check_shape(&self, path: &Path, shape: (usize, usize)) -> Result<()> {
        if shape == self.shape() {
            return Ok(());
        }
        Err(RuNeStackError::GridShapeMismatch {
            path: path.to_path_buf(),
            expected_rows: self.rows,
            expected_cols: self.cols,
            rows: shape.0,
            cols: shape.1,
        })
    }
}

fn cell_centres(origin: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| origin + step / 2.0 + step * i as f64)
        .collect()
}
