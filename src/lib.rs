//! RuNeStack: PCRaster map stacks to NetCDF time series
//!
//! RuNeStack converts a time-ordered stack of single-band PCRaster maps (one
//! file per timestep, named after the legacy 8.3 map stack scheme) into a
//! single CF-style NetCDF file with `time`, `lat` and `lon` axes, ready to be
//! used as model forcing.
//!
//! ## Key Features
//!
//! - **Bounded memory**: maps are collected in a fixed-size buffer window and
//!   written in bulk, so memory does not grow with the length of the series
//! - **Exact placement**: every map is placed by looking its timestamp up on
//!   the container's own time axis
//! - **Daily and hourly stacks**: hourly steps are stored as fractional days
//! - **Multiple variables**: several map stacks can be merged into one file
//!
//! ## Module Organization
//!
//! - [`timestamps`]: ordered timestamp sequences for a period
//! - [`calendar`]: CF time units and calendars
//! - [`geometry`]: the grid lattice shared by all maps
//! - [`raster`]: raster reader boundary and map stack file naming
//! - [`csf`]: PCRaster CSF map reader
//! - [`metadata`]: global attributes of the output file
//! - [`container`]: container creation and append access
//! - [`writer`]: the buffered series writer
//! - [`convert`]: end-to-end conversion driver
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//! ```rust,no_run
//! use ru_ne_stack::prelude::*;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let end = NaiveDate::from_ymd_opt(1990, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let config = ConvertConfig::new(start, end, vec!["P".into(), "PET".into()], "inmaps", "inmaps.nc")
//!     .with_buffer_capacity(365);
//!
//! let summary = ru_ne_stack::convert::run(&config).unwrap();
//! println!("{summary}");
//! ```

pub mod calendar;
pub mod container;
pub mod convert;
pub mod csf;
pub mod errors;
pub mod geometry;
pub mod metadata;
pub mod raster;
pub mod timestamps;
pub mod writer;

pub use errors::{Result, RuNeStackError};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::calendar::{Calendar, TimeUnits};
    pub use crate::container::{ContainerSummary, NetcdfStore, SeriesStore, TimeEncoding, VariableSpec};
    pub use crate::convert::ConvertConfig;
    pub use crate::csf::CsfReader;
    pub use crate::errors::{Result, RuNeStackError};
    pub use crate::geometry::GridGeometry;
    pub use crate::metadata::GlobalMetadata;
    pub use crate::raster::{Grid, RasterSource};
    pub use crate::timestamps::StepUnit;
    pub use crate::writer::{BufferWindow, SeriesWriter};
}
