//! Defines command-line interface options using `clap` for the RuNeStack application.

use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use ru_ne_stack::container::DEFAULT_DEFLATE_LEVEL;
use ru_ne_stack::convert::{ConvertConfig, DEFAULT_UNITS};
use ru_ne_stack::timestamps::StepUnit;
use ru_ne_stack::writer::DEFAULT_BUFFER_CAPACITY;
use std::path::PathBuf;

/// Date formats accepted for `--start` and `--end`, tried in order
const DATE_FORMATS: &[&str] = &["%d-%m-%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DAY_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d"];

/// Convert PCRaster map stacks into a NetCDF time series
#[derive(Parser, Debug)]
#[command(
    version,
    name = "runestack",
    about = "Convert PCRaster map stacks to a NetCDF time series"
)]
pub struct Args {
    /// First timestep, e.g. "01-01-1990 00:00:00"
    #[arg(short = 'S', long, value_parser = parse_datetime)]
    pub start: NaiveDateTime,

    /// Last timestep, inclusive (only its date is used)
    #[arg(short = 'E', long, value_parser = parse_datetime)]
    pub end: NaiveDateTime,

    /// Map stack prefix to convert; repeat for several variables
    #[arg(short = 'N', long = "name", required = true)]
    pub names: Vec<String>,

    /// Directory holding the map stacks
    #[arg(short = 'I', long = "input", default_value = "inmaps")]
    pub input_dir: PathBuf,

    /// Output NetCDF file, replaced if it exists
    #[arg(short = 'O', long, default_value = "inmaps.nc")]
    pub output: PathBuf,

    /// Number of maps held in memory before a bulk write
    #[arg(short = 'b', long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer: usize,

    /// Timestep in seconds (86400 or 3600)
    #[arg(short = 't', long, default_value = "86400", value_parser = parse_step)]
    pub timestep: StepUnit,

    /// Units attribute of the converted variables
    #[arg(short = 'U', long, default_value = DEFAULT_UNITS)]
    pub units: String,

    /// JSON file with extra global attributes
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Deflate level for the data variables (0 disables compression)
    #[arg(long, default_value_t = DEFAULT_DEFLATE_LEVEL, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub deflate: u8,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Build the conversion settings; global metadata starts from the defaults.
    pub fn into_config(self) -> ConvertConfig {
        let mut config = ConvertConfig::new(self.start, self.end, self.names, self.input_dir, self.output)
            .with_step(self.timestep)
            .with_buffer_capacity(self.buffer)
            .with_units(self.units);
        config.deflate_level = self.deflate;
        config
    }
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    for fmt in DAY_FORMATS {
        if let Some(t) = NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(t);
        }
    }
    Err(format!(
        "Invalid date '{}', expected format like '01-01-1990 00:00:00'",
        s
    ))
}

fn parse_step(s: &str) -> Result<StepUnit, String> {
    let seconds: u64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid timestep '{}', expected seconds", s))?;
    StepUnit::from_seconds(seconds).map_err(|e| e.to_string())
}
