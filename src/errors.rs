//! Centralized error handling for RuNeStack
//!
//! Every fallible operation in the library returns [`Result`]. Conditions the
//! converter treats as fatal (an unreadable map, a container that cannot be
//! appended to) are still plain error values here; the binary decides to abort.

use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Main error type for RuNeStack operations
#[derive(Debug, thiserror::Error)]
pub enum RuNeStackError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// A source map could not be opened or decoded
    #[error("could not read raster '{}': {reason}", .path.display())]
    RasterRead { path: PathBuf, reason: String },

    /// A CSF map stores its cells in a representation we do not decode
    #[error("unsupported cell representation 0x{code:02X} in '{}'", .path.display())]
    UnsupportedCellRepresentation { path: PathBuf, code: u16 },

    /// A map does not share the reference grid's lattice
    #[error(
        "grid '{}' is {rows}x{cols} (rows x cols), expected {expected_rows}x{expected_cols}",
        .path.display()
    )]
    GridShapeMismatch {
        path: PathBuf,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// The requested period ends before it starts
    #[error("end {end} lies before start {start}")]
    InvalidTimeRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// Only daily and hourly steps are supported
    #[error("unsupported timestep of {seconds} seconds (use 86400 or 3600)")]
    UnsupportedTimestep { seconds: u64 },

    /// A CF time units string could not be parsed
    #[error("invalid time units '{units}': {reason}")]
    InvalidTimeUnits { units: String, reason: String },

    /// The calendar attribute names a calendar we cannot convert
    #[error("unsupported calendar '{calendar}'")]
    UnsupportedCalendar { calendar: String },

    /// A requested timestamp has no slot on the container's time axis
    #[error("timestamp {timestamp} is not on the time axis of '{}'", .path.display())]
    TimestampNotInContainer {
        timestamp: NaiveDateTime,
        path: PathBuf,
    },

    /// Variable not found in NetCDF file
    #[error("Variable '{var}' not found in file")]
    VariableNotFound { var: String },

    /// Attribute missing from a variable
    #[error("Attribute '{attr}' not found on variable '{var}'")]
    AttributeNotFound { var: String, attr: String },

    /// An existing variable does not have the layout the writer needs
    #[error("Variable '{var}' has dimensions [{}], expected [time, lat, lon]", .dims.join(", "))]
    UnexpectedLayout { var: String, dims: Vec<String> },

    /// The buffer window cannot hold zero timesteps
    #[error("buffer capacity must be at least 1, got {capacity}")]
    InvalidBufferCapacity { capacity: usize },

    /// Nothing to convert
    #[error("at least one map stack name is required")]
    NoVariables,

    /// User metadata could not be interpreted
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// JSON decoding errors for metadata files
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for RuNeStack operations
pub type Result<T> = std::result::Result<T, RuNeStackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_grid_shape_mismatch() {
        let err = RuNeStackError::GridShapeMismatch {
            path: PathBuf::from("inmaps/P0000000.002"),
            expected_rows: 2,
            expected_cols: 3,
            rows: 3,
            cols: 2,
        };
        assert_eq!(
            err.to_string(),
            "grid 'inmaps/P0000000.002' is 3x2 (rows x cols), expected 2x3"
        );
    }

    #[test]
    fn display_unsupported_cell_representation() {
        let err = RuNeStackError::UnsupportedCellRepresentation {
            path: PathBuf::from("a.map"),
            code: 0x15,
        };
        assert_eq!(
            err.to_string(),
            "unsupported cell representation 0x15 in 'a.map'"
        );
    }

    #[test]
    fn display_unexpected_layout() {
        let err = RuNeStackError::UnexpectedLayout {
            var: "P".to_string(),
            dims: vec!["lat".to_string(), "lon".to_string()],
        };
        assert!(err.to_string().contains("[lat, lon]"));
    }

    #[test]
    fn from_netcdf_error() {
        let nc_err = netcdf::Error::Str("test nc error".to_string());
        let err: RuNeStackError = nc_err.into();
        assert!(matches!(err, RuNeStackError::NetCDFError(_)));
        assert!(err.to_string().contains("test nc error"));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_bounds<T: std::error::Error>() {}
        assert_bounds::<RuNeStackError>();
    }
}
