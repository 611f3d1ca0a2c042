//! NetCDF time-series container
//!
//! A container holds an unlimited `time` axis, fixed `lat`/`lon` axes taken
//! from the reference grid, a WGS84 `projection` descriptor and any number of
//! `(time, lat, lon)` variables. [`initialize`] creates it once; writers then
//! reopen it through [`NetcdfStore`] to append one variable at a time.

use crate::calendar::{Calendar, TimeUnits};
use crate::errors::{Result, RuNeStackError};
use crate::geometry::GridGeometry;
use crate::metadata::{AttrValue, GlobalMetadata};
use chrono::NaiveDateTime;
use ndarray::ArrayView3;
use netcdf::{AttributeValue, FileMut, Variable};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TIME_DIM: &str = "time";
pub const LAT_DIM: &str = "lat";
pub const LON_DIM: &str = "lon";
pub const PROJECTION_VAR: &str = "projection";

/// Fill value of every data variable created by RuNeStack
pub const FILL_VALUE: f32 = -9999.0;

/// Default zlib level for data variables
pub const DEFAULT_DEFLATE_LEVEL: u8 = 4;

/// How the numeric time axis is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEncoding {
    pub units: TimeUnits,
    pub calendar: Calendar,
}

impl Default for TimeEncoding {
    fn default() -> Self {
        Self {
            units: TimeUnits::default(),
            calendar: Calendar::Gregorian,
        }
    }
}

/// Description of a data variable to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    pub units: String,
    pub standard_name: String,
}

impl VariableSpec {
    /// Variable whose standard name equals its name
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            standard_name: name.clone(),
            name,
            units: units.into(),
        }
    }

    pub fn with_standard_name(mut self, standard_name: impl Into<String>) -> Self {
        self.standard_name = standard_name.into();
        self
    }
}

/// Decoded time axis of an existing container
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub values: Vec<f64>,
    pub encoding: TimeEncoding,
}

impl TimeAxis {
    /// Encode `timestamps` one by one. Sub-daily steps become fractional
    /// offsets when the units are coarser than the step.
    pub fn encode(timestamps: &[NaiveDateTime], encoding: TimeEncoding) -> Self {
        Self {
            values: timestamps.iter().map(|&t| encoding.units.date2num(t)).collect(),
            encoding,
        }
    }

    /// Timestamps of every slot, in axis order
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        self.values
            .iter()
            .map(|&v| self.encoding.units.num2date(v))
            .collect()
    }

    /// Map from timestamp to slot index
    pub fn slot_lookup(&self) -> Result<HashMap<NaiveDateTime, usize>> {
        Ok(self
            .timestamps()?
            .into_iter()
            .enumerate()
            .map(|(slot, t)| (t, slot))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Storage the buffered writer flushes into
pub trait SeriesStore {
    /// The container's time axis.
    fn time_axis(&self) -> Result<TimeAxis>;

    /// Declare `spec` unless it exists, returning its fill value.
    fn prepare_variable(&mut self, spec: &VariableSpec) -> Result<f32>;

    /// Write `block` (shaped `(steps, lat, lon)`) to the slots starting at
    /// `first_slot`.
    fn write_block(&mut self, variable: &str, first_slot: usize, block: ArrayView3<f32>) -> Result<()>;
}

/// Create a new container at `path`, replacing any existing file.
///
/// The time axis holds one entry per timestamp, encoded with `encoding`; the
/// `lat`/`lon` axes hold the cell centres of `geometry`. The file is closed
/// before returning.
///
/// Fails with [`RuNeStackError::UnsupportedCalendar`] before touching `path`
/// if a timestamp cannot be encoded in the chosen calendar.
pub fn initialize(
    path: &Path,
    timestamps: &[NaiveDateTime],
    geometry: &GridGeometry,
    metadata: &GlobalMetadata,
    encoding: TimeEncoding,
) -> Result<()> {
    if let Some(early) = timestamps.iter().find(|&&t| !encoding.calendar.supports(t)) {
        return Err(RuNeStackError::UnsupportedCalendar {
            calendar: format!("{} for {}", encoding.calendar, early),
        });
    }

    info!("Setting up '{}'", path.display());
    if path.exists() {
        fs::remove_file(path)?;
    }

    let mut file = netcdf::create(path)?;

    info!(
        "Setting up dimensions and attributes. lat: {} lon: {}",
        geometry.rows, geometry.cols
    );
    file.add_unlimited_dimension(TIME_DIM)?;
    file.add_dimension(LAT_DIM, geometry.rows)?;
    file.add_dimension(LON_DIM, geometry.cols)?;

    let axis = TimeAxis::encode(timestamps, encoding);
    {
        let mut time_var = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
        time_var.put_attribute("units", encoding.units.to_string())?;
        time_var.put_attribute("calendar", encoding.calendar.to_string())?;
        time_var.put_attribute("standard_name", "time")?;
        time_var.put_attribute("long_name", "time")?;
        if !axis.is_empty() {
            time_var.put_values(&axis.values, 0..axis.len())?;
        }
    }

    {
        let mut lat_var = file.add_variable::<f32>(LAT_DIM, &[LAT_DIM])?;
        lat_var.put_attribute("standard_name", "latitude")?;
        lat_var.put_attribute("long_name", "latitude")?;
        lat_var.put_attribute("units", "degrees_north")?;
        let lat: Vec<f32> = geometry.y_axis().iter().map(|&y| y as f32).collect();
        lat_var.put_values(&lat, ..)?;
    }

    {
        let mut lon_var = file.add_variable::<f32>(LON_DIM, &[LON_DIM])?;
        lon_var.put_attribute("standard_name", "longitude")?;
        lon_var.put_attribute("long_name", "longitude")?;
        lon_var.put_attribute("units", "degrees_east")?;
        let lon: Vec<f32> = geometry.x_axis().iter().map(|&x| x as f32).collect();
        lon_var.put_values(&lon, ..)?;
    }

    {
        let mut projection = file.add_variable::<i32>(PROJECTION_VAR, &[])?;
        projection.put_attribute("long_name", "wgs84")?;
        projection.put_attribute("EPSG_code", "EPSG:4326")?;
        projection.put_attribute("proj4_params", "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs")?;
        projection.put_attribute("grid_mapping_name", "latitude_longitude")?;
    }

    for (name, value) in metadata.iter() {
        match value {
            AttrValue::Text(s) => {
                file.add_attribute(name, s.as_str())?;
            }
            AttrValue::Int(i) => {
                file.add_attribute(name, *i)?;
            }
            AttrValue::Float(f) => {
                file.add_attribute(name, *f)?;
            }
        }
    }

    // Dropping the handle flushes and closes the file
    drop(file);
    debug!("Closed '{}' with {} timesteps", path.display(), timestamps.len());
    Ok(())
}

/// A container opened for appending variables
pub struct NetcdfStore {
    path: PathBuf,
    file: FileMut,
    deflate_level: u8,
}

impl NetcdfStore {
    /// Open an existing container for append.
    pub fn append(path: &Path) -> Result<Self> {
        let file = netcdf::append(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            deflate_level: DEFAULT_DEFLATE_LEVEL,
        })
    }

    /// zlib level for variables this store declares; 0 disables compression.
    pub fn with_deflate_level(mut self, level: u8) -> Self {
        self.deflate_level = level.min(9);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush all writes and release the file handle.
    pub fn close(self) -> Result<()> {
        debug!("Closing '{}'", self.path.display());
        drop(self.file);
        Ok(())
    }
}

fn string_attribute(var: &Variable, var_name: &str, attr: &str) -> Result<Option<String>> {
    match var.attribute_value(attr) {
        None => Ok(None),
        Some(value) => match value? {
            AttributeValue::Str(s) => Ok(Some(s)),
            _ => Err(RuNeStackError::AttributeNotFound {
                var: var_name.to_string(),
                attr: attr.to_string(),
            }),
        },
    }
}

fn fill_value(var: &Variable) -> Option<f32> {
    var.attribute("_FillValue")
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Float(v) => Some(v),
            AttributeValue::Double(v) => Some(v as f32),
            AttributeValue::Short(v) => Some(f32::from(v)),
            _ => None,
        })
}

impl SeriesStore for NetcdfStore {
    fn time_axis(&self) -> Result<TimeAxis> {
        let var = self
            .file
            .variable(TIME_DIM)
            .ok_or_else(|| RuNeStackError::VariableNotFound {
                var: TIME_DIM.to_string(),
            })?;

        let units = string_attribute(&var, TIME_DIM, "units")?.ok_or_else(|| {
            RuNeStackError::AttributeNotFound {
                var: TIME_DIM.to_string(),
                attr: "units".to_string(),
            }
        })?;
        // CF: a missing calendar means the standard calendar
        let calendar = match string_attribute(&var, TIME_DIM, "calendar")? {
            Some(name) => name.parse()?,
            None => Calendar::Gregorian,
        };

        Ok(TimeAxis {
            values: var.get_values::<f64, _>(..)?,
            encoding: TimeEncoding {
                units: units.parse()?,
                calendar,
            },
        })
    }

    fn prepare_variable(&mut self, spec: &VariableSpec) -> Result<f32> {
        if let Some(existing) = self.file.variable(&spec.name) {
            let dims: Vec<String> = existing
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect();
            if dims != [TIME_DIM, LAT_DIM, LON_DIM] {
                return Err(RuNeStackError::UnexpectedLayout {
                    var: spec.name.clone(),
                    dims,
                });
            }
            debug!("Reusing existing variable '{}'", spec.name);
            return Ok(fill_value(&existing).unwrap_or(FILL_VALUE));
        }

        let mut var = self
            .file
            .add_variable::<f32>(&spec.name, &[TIME_DIM, LAT_DIM, LON_DIM])?;
        if self.deflate_level > 0 {
            var.set_compression(i32::from(self.deflate_level), false)?;
        }
        var.put_attribute("_FillValue", FILL_VALUE)?;
        var.put_attribute("units", spec.units.as_str())?;
        var.put_attribute("standard_name", spec.standard_name.as_str())?;
        var.put_attribute("grid_mapping", PROJECTION_VAR)?;
        debug!("Declared variable '{}' [{}]", spec.name, spec.units);
        Ok(FILL_VALUE)
    }

    fn write_block(&mut self, variable: &str, first_slot: usize, block: ArrayView3<f32>) -> Result<()> {
        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| RuNeStackError::VariableNotFound {
                var: variable.to_string(),
            })?;
        let steps = block.dim().0;
        var.put(block, (first_slot..first_slot + steps, .., ..))?;
        Ok(())
    }
}

/// Dimension and variable listing of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// `(name, length, is_unlimited)`
    pub dimensions: Vec<(String, usize, bool)>,
    /// `(name, dimension names)`
    pub variables: Vec<(String, Vec<String>)>,
}

impl ContainerSummary {
    /// Read the layout of the container at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        let dimensions = file
            .dimensions()
            .map(|d| (d.name().to_string(), d.len(), d.is_unlimited()))
            .collect();
        let variables = file
            .variables()
            .map(|v| {
                let dims = v.dimensions().iter().map(|d| d.name().to_string()).collect();
                (v.name().to_string(), dims)
            })
            .collect();
        Ok(Self {
            dimensions,
            variables,
        })
    }

    /// Length of a dimension, if present
    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, len, _)| *len)
    }
}

impl fmt::Display for ContainerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|(name, len, unlimited)| {
                if *unlimited {
                    format!("{name}[{len}, unlimited]")
                } else {
                    format!("{name}[{len}]")
                }
            })
            .collect();
        let vars: Vec<String> = self
            .variables
            .iter()
            .map(|(name, dims)| format!("{name}({})", dims.join(", ")))
            .collect();
        write!(f, "dimensions: {}; variables: {}", dims.join(", "), vars.join(", "))
    }
}
