//! GDAS to GraphCast input preparation.
//!
//! Reads GDAS 0.25 degree GRIB2 files for a window of cycles and builds a
//! single NetCDF dataset laid out the way GraphCast expects its inputs.
//!
//! # Architecture
//!
//! Data flows strictly forward:
//!
//! - [`locator`]: cycle window to local file paths
//! - [`extract`]: file + variable + levels to a normalized [`RawRecord`],
//!   through `wgrib2` or in-process decoding
//! - [`assemble`]: records to one [`NormalizedDataset`]
//! - [`writer`]: dataset to NetCDF, then cleanup
//!
//! [`Ingester`] drives the whole chain.

pub mod assemble;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod locator;
pub mod record;
pub mod tables;
pub mod writer;
mod ingester;

// Re-exports
pub use assemble::{Assembler, Capture};
pub use config::{DecodeMethod, MslpSource, PipelineConfig, PressureLevels};
pub use dataset::{DataVariable, NormalizedDataset};
pub use error::{IngestionError, Result};
pub use extract::{
    combine_levels, extract_variable, level_pattern, netcdf_variable_name, DirectExtractor, ExtractRequest,
    Extractor, Wgrib2Extractor,
};
pub use ingester::{Ingester, IngestionResult};
pub use locator::{CycleFiles, LocatedFile, Locator};
pub use record::RawRecord;
pub use tables::{variable_table, FileFamily, LevelSelector, UnitConversion, VariableSpec};
pub use writer::DatasetWriter;
