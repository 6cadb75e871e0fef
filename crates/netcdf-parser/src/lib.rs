//! NetCDF access for the GDAS preparation pipeline.
//!
//! Reads the single-variable intermediates produced by `wgrib2 -netcdf`
//! through the native netcdf library (which wraps HDF5).
//! System requirements: libhdf5-dev libnetcdf-dev.

pub mod error;
pub mod native;
pub mod wgrib2;

pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
pub use wgrib2::{decode_time_units, read_wgrib2_variable, Wgrib2Field};
