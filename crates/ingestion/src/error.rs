//! Error types for the ingestion crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing a dataset.
///
/// Every variant is fatal for the run; nothing is retried and no output file
/// is left behind.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("No file matching '{pattern}' in {dir}")]
    FileNotFound { dir: PathBuf, pattern: String },

    #[error("Expected exactly one file matching '{pattern}', found {}: {}", .matches.len(), display_paths(.matches))]
    AmbiguousFile {
        pattern: String,
        matches: Vec<PathBuf>,
    },

    #[error("{path} belongs to cycle hour {found:02}, expected {expected:02}")]
    UnexpectedCycle {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("Failed to decode {variable} ({level}) from {file}: {reason}")]
    Decode {
        file: PathBuf,
        variable: String,
        level: String,
        reason: String,
    },

    #[error("Coordinate mismatch for {variable}: {reason}")]
    CoordinateMismatch { variable: String, reason: String },

    #[error("Unexpected shape for {variable} from {file}: {reason}")]
    Shape {
        variable: String,
        file: PathBuf,
        reason: String,
    },

    #[error("Variable {variable} missing for cycle {cycle}")]
    MissingVariable { variable: String, cycle: String },

    #[error("Level axis of {variable} is {found:?}, expected {expected:?}")]
    MissingLevels {
        variable: String,
        expected: Vec<u32>,
        found: Vec<u32>,
    },

    #[error("Invalid time window: {0}")]
    Time(#[from] gdas_common::TimeParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf_parser::NetCdfError),

    #[error("NetCDF write failed: {0}")]
    NetCdfWrite(#[from] netcdf::Error),

    #[error("GRIB2 error: {0}")]
    Grib2(#[from] grib2_parser::Grib2Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
