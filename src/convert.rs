//! Map stack conversion driver
//!
//! Takes the reference geometry from the first map of the first stack, sets
//! up the container once and appends every requested stack as its own
//! variable.

use crate::container::{self, ContainerSummary, TimeEncoding, VariableSpec, DEFAULT_DEFLATE_LEVEL};
use crate::csf::CsfReader;
use crate::errors::{Result, RuNeStackError};
use crate::geometry::GridGeometry;
use crate::metadata::GlobalMetadata;
use crate::raster::{mapstack_file_name, RasterSource};
use crate::timestamps::{self, StepUnit};
use crate::writer::{SeriesWriter, DEFAULT_BUFFER_CAPACITY};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::info;

/// Units given to every converted variable unless overridden
pub const DEFAULT_UNITS: &str = "mm";

/// Everything a conversion run needs
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub step: StepUnit,
    /// Map stack prefixes; each becomes a variable of the same name
    pub names: Vec<String>,
    pub source_dir: PathBuf,
    pub output: PathBuf,
    pub buffer_capacity: usize,
    pub units: String,
    pub time_encoding: TimeEncoding,
    pub deflate_level: u8,
    pub metadata: GlobalMetadata,
}

impl ConvertConfig {
    /// Daily conversion with default buffer, units, encoding and metadata
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        names: Vec<String>,
        source_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            start,
            end,
            step: StepUnit::Day,
            names,
            source_dir: source_dir.into(),
            output: output.into(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            units: DEFAULT_UNITS.to_string(),
            time_encoding: TimeEncoding::default(),
            deflate_level: DEFAULT_DEFLATE_LEVEL,
            metadata: GlobalMetadata::defaults(),
        }
    }

    pub fn with_step(mut self, step: StepUnit) -> Self {
        self.step = step;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Reject configurations that cannot produce a container.
    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(RuNeStackError::NoVariables);
        }
        if self.buffer_capacity == 0 {
            return Err(RuNeStackError::InvalidBufferCapacity {
                capacity: self.buffer_capacity,
            });
        }
        if self.end.date() < self.start.date() {
            return Err(RuNeStackError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Convert the configured PCRaster map stacks into one container.
///
/// The first map of the first stack fixes the grid geometry; every later map
/// must share its lattice.
pub fn run(config: &ConvertConfig) -> Result<ContainerSummary> {
    config.validate()?;
    let geometry = reference_geometry(config, &CsfReader::new())?;
    convert_stacks(config, &CsfReader::with_geometry(geometry), geometry)
}

/// Same as [`run`], reading maps through `source`.
pub fn run_with_source<R: RasterSource>(config: &ConvertConfig, source: &R) -> Result<ContainerSummary> {
    config.validate()?;
    let geometry = reference_geometry(config, source)?;
    convert_stacks(config, source, geometry)
}

fn reference_geometry<R: RasterSource>(config: &ConvertConfig, source: &R) -> Result<GridGeometry> {
    let first = config.names.first().ok_or(RuNeStackError::NoVariables)?;
    let path = config.source_dir.join(mapstack_file_name(first, 1));
    info!("Using {} as reference grid", path.display());
    Ok(source.read(&path)?.geometry)
}

fn convert_stacks<R: RasterSource>(
    config: &ConvertConfig,
    source: &R,
    geometry: GridGeometry,
) -> Result<ContainerSummary> {
    let timestamps = timestamps::sequence(config.start, config.end, config.step)?;
    if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
        info!(
            "{} timesteps of one {} from {} to {}",
            timestamps.len(),
            config.step,
            first,
            last
        );
    }

    container::initialize(
        &config.output,
        &timestamps,
        &geometry,
        &config.metadata,
        config.time_encoding,
    )?;

    let writer = SeriesWriter::new(source, geometry).with_buffer_capacity(config.buffer_capacity);
    for name in &config.names {
        info!("Converting mapstack: {} to {}", name, config.output.display());
        let spec = VariableSpec::new(name.as_str(), config.units.as_str());
        writer.write_series(
            &config.source_dir,
            name,
            &config.output,
            &spec,
            &timestamps,
            config.deflate_level,
        )?;
    }

    ContainerSummary::read(&config.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid timestamp")
    }

    fn config() -> ConvertConfig {
        ConvertConfig::new(at(1), at(3), vec!["P".to_string()], "inmaps", "out.nc")
    }

    #[test]
    fn defaults() {
        let cfg = config();
        assert_eq!(cfg.step, StepUnit::Day);
        assert_eq!(cfg.buffer_capacity, 600);
        assert_eq!(cfg.units, "mm");
        assert_eq!(cfg.deflate_level, DEFAULT_DEFLATE_LEVEL);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        let mut cfg = config();
        cfg.names.clear();
        assert!(matches!(cfg.validate(), Err(RuNeStackError::NoVariables)));

        let cfg = config().with_buffer_capacity(0);
        assert!(matches!(
            cfg.validate(),
            Err(RuNeStackError::InvalidBufferCapacity { .. })
        ));

        let cfg = ConvertConfig::new(at(3), at(1), vec!["P".to_string()], "inmaps", "out.nc");
        assert!(matches!(
            cfg.validate(),
            Err(RuNeStackError::InvalidTimeRange { .. })
        ));
    }
}
