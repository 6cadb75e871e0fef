//! Error types for GRIB2 parsing.

use thiserror::Error;

/// Result type for GRIB2 parser operations.
pub type Grib2Result<T> = Result<T, Grib2Error>;

#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported {what} template {template}")]
    UnsupportedTemplate { what: &'static str, template: u16 },

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),
}
