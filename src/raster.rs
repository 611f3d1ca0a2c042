//! Raster source boundary
//!
//! The converter reads one single-band map per timestep. How a map is decoded
//! is hidden behind [`RasterSource`]; the map stack naming scheme that turns a
//! stack prefix and a step number into a file name lives here too.

use crate::errors::Result;
use crate::geometry::GridGeometry;
use ndarray::Array2;
use std::path::Path;

/// Longest prefix the 8.3 map stack naming scheme can hold
pub const MAX_PREFIX_LEN: usize = 8;

/// One decoded map
#[derive(Debug, Clone)]
pub struct Grid {
    pub geometry: GridGeometry,
    /// Cell values, shaped `(rows, cols)`, first row northernmost
    pub data: Array2<f32>,
    /// Value marking missing cells, if the source declares one
    pub nodata: Option<f32>,
}

impl Grid {
    /// Consume the grid, replacing its no-data cells with `fill`.
    pub fn into_filled(self, fill: f32) -> Array2<f32> {
        let mut data = self.data;
        if let Some(nodata) = self.nodata {
            replace_nodata(&mut data, nodata, fill);
        }
        data
    }
}

/// Replace every cell equal to `nodata` with `fill`. A NaN sentinel matches
/// NaN cells.
pub fn replace_nodata(data: &mut Array2<f32>, nodata: f32, fill: f32) {
    if nodata.is_nan() {
        data.mapv_inplace(|v| if v.is_nan() { fill } else { v });
    } else {
        data.mapv_inplace(|v| if v == nodata { fill } else { v });
    }
}

/// Anything that can decode a single map file
pub trait RasterSource {
    /// Read the map at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be decoded.
    fn read(&self, path: &Path) -> Result<Grid>;
}

/// Shorten a stack prefix to the eight characters the naming scheme allows.
pub fn truncate_prefix(prefix: &str) -> &str {
    match prefix.char_indices().nth(MAX_PREFIX_LEN) {
        Some((cut, _)) => &prefix[..cut],
        None => prefix,
    }
}

/// File name of the `step`-th map (1-based) of the stack `prefix`.
///
/// The step is split into thousands and remainder; the thousands are
/// zero-padded so that prefix and thousands fill eight characters, and the
/// remainder becomes a three-digit extension, e.g. `PRECIP01.234` for step
/// 1234. Prefixes longer than eight characters are truncated first.
pub fn mapstack_file_name(prefix: &str, step: usize) -> String {
    let prefix = truncate_prefix(prefix);
    let width = MAX_PREFIX_LEN - prefix.chars().count();
    let thousands = step / 1000;
    let below_thousand = step % 1000;
    format!("{prefix}{thousands:0width$}.{below_thousand:03}")
}
