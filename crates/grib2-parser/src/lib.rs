//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! Decodes the subset of GRIB2 found in NCEP GDAS/GFS 0.25° products:
//! regular lat/lon grids (template 3.0), instantaneous and statistically
//! processed products (templates 4.0 and 4.8) and simple packing
//! (template 5.0). Other packings are decoded through the `grib` crate.
//!
//! ```no_run
//! use grib2_parser::Grib2Reader;
//!
//! let data = std::fs::read("gdas.t00z.pgrb2.0p25.f000").unwrap();
//! let mut reader = Grib2Reader::new(bytes::Bytes::from(data));
//! while let Some(msg) = reader.next_message().unwrap() {
//!     println!("{} {}", msg.parameter(), msg.level_description);
//! }
//! ```

pub mod error;
pub mod reader;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use error::{Grib2Error, Grib2Result};
pub use reader::{Grib2Message, Grib2Reader};
pub use sections::{GridDefinition, ProductDefinition, StatisticalInterval};
pub use tables::{Grib2Tables, LevelDescription};
