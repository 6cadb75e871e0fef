//! Common types shared across the GDAS preparation crates.

pub mod level;
pub mod time;

pub use level::LevelType;
pub use time::{format_cycle, parse_cycle, CycleRange, TimeParseError, ValidTime, CYCLE_INTERVAL_HOURS};
