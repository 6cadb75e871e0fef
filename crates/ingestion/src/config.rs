//! Pipeline configuration.
//!
//! `PipelineConfig` is usually built by the `gdas-ingester` binary from its
//! command line, optionally layered over a YAML file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// Pressure-level tables in hPa.
pub mod pressure_levels {
    pub const LEVELS_13: [u32; 13] = [50, 100, 150, 200, 250, 300, 400, 500, 600, 700, 850, 925, 1000];

    /// 37-level levels carried by the pgrb2 analysis file.
    pub const LEVELS_37_PRIMARY: [u32; 31] = [
        1, 2, 3, 5, 7, 10, 20, 30, 50, 70, 100, 150, 200, 250, 300, 350, 400, 450, 500, 550, 600,
        650, 700, 750, 800, 850, 900, 925, 950, 975, 1000,
    ];

    /// 37-level levels only found in the pgrb2b analysis file.
    pub const LEVELS_37_SECONDARY: [u32; 6] = [125, 175, 225, 775, 825, 875];
}

/// Vertical resolution of the prepared dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PressureLevels {
    L13,
    L37,
}

impl PressureLevels {
    pub fn count(&self) -> usize {
        match self {
            PressureLevels::L13 => 13,
            PressureLevels::L37 => 37,
        }
    }

    /// Levels read from the pgrb2 analysis file.
    pub fn primary(&self) -> &'static [u32] {
        match self {
            PressureLevels::L13 => &pressure_levels::LEVELS_13,
            PressureLevels::L37 => &pressure_levels::LEVELS_37_PRIMARY,
        }
    }

    /// Levels read from the pgrb2b analysis file, if any.
    pub fn secondary(&self) -> Option<&'static [u32]> {
        match self {
            PressureLevels::L13 => None,
            PressureLevels::L37 => Some(&pressure_levels::LEVELS_37_SECONDARY),
        }
    }

    /// Full level table, ascending.
    pub fn all(&self) -> Vec<u32> {
        let mut levels = self.primary().to_vec();
        if let Some(secondary) = self.secondary() {
            levels.extend_from_slice(secondary);
        }
        levels.sort_unstable();
        levels
    }
}

impl TryFrom<u32> for PressureLevels {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            13 => Ok(PressureLevels::L13),
            37 => Ok(PressureLevels::L37),
            other => Err(format!("unsupported level count {} (expected 13 or 37)", other)),
        }
    }
}

impl From<PressureLevels> for u32 {
    fn from(levels: PressureLevels) -> Self {
        levels.count() as u32
    }
}

impl fmt::Display for PressureLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// How raw GRIB2 records are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMethod {
    /// Shell out to `wgrib2 -netcdf` and read the intermediate files.
    #[default]
    Wgrib2,
    /// Decode in-process with `grib2-parser`.
    #[serde(alias = "pygrib")]
    Direct,
}

impl FromStr for DecodeMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgrib2" => Ok(DecodeMethod::Wgrib2),
            "direct" | "pygrib" => Ok(DecodeMethod::Direct),
            other => Err(format!("unknown decode method '{}'", other)),
        }
    }
}

impl fmt::Display for DecodeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMethod::Wgrib2 => f.write_str("wgrib2"),
            DecodeMethod::Direct => f.write_str("direct"),
        }
    }
}

/// Record used for `mean_sea_level_pressure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MslpSource {
    /// PRMSL at mean sea level.
    #[default]
    Prmsl,
    /// PRES at the surface. Not a sea-level reduction.
    SurfacePressure,
}

/// Settings for one preparation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub levels: PressureLevels,
    pub method: DecodeMethod,
    /// Directory the raw tree lives under (`noaa-gfs-bdp-pds_<levels>`).
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Where wgrib2 intermediates go. Defaults to `output_dir`.
    pub work_dir: Option<PathBuf>,
    pub wgrib2_path: PathBuf,
    /// Keep the raw tree after a successful write.
    pub keep_downloaded: bool,
    pub mslp_source: MslpSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            levels: PressureLevels::L13,
            method: DecodeMethod::default(),
            download_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            work_dir: None,
            wgrib2_path: PathBuf::from("wgrib2"),
            keep_downloaded: false,
            mslp_source: MslpSource::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| {
            IngestionError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Root of the raw GRIB2 tree: `<download_dir>/noaa-gfs-bdp-pds_<levels>`.
    pub fn raw_data_root(&self) -> PathBuf {
        self.download_dir
            .join(format!("noaa-gfs-bdp-pds_{}", self.levels.count()))
    }

    pub fn intermediate_dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_tables() {
        assert_eq!(PressureLevels::L13.all().len(), 13);
        let all = PressureLevels::L37.all();
        assert_eq!(all.len(), 37);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert!(PressureLevels::L13.secondary().is_none());
    }

    #[test]
    fn test_level_count_parsing() {
        assert_eq!(PressureLevels::try_from(37).unwrap(), PressureLevels::L37);
        assert!(PressureLevels::try_from(25).is_err());
    }

    #[test]
    fn test_method_aliases() {
        assert_eq!("pygrib".parse::<DecodeMethod>().unwrap(), DecodeMethod::Direct);
        assert_eq!("WGRIB2".parse::<DecodeMethod>().unwrap(), DecodeMethod::Wgrib2);
        assert!("eccodes".parse::<DecodeMethod>().is_err());
    }

    #[test]
    fn test_yaml_with_defaults() {
        let yaml = "levels: 37\nmethod: pygrib\ndownload_dir: /data\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.levels, PressureLevels::L37);
        assert_eq!(config.method, DecodeMethod::Direct);
        assert_eq!(config.mslp_source, MslpSource::Prmsl);
        assert!(!config.keep_downloaded);
        assert_eq!(
            config.raw_data_root(),
            PathBuf::from("/data/noaa-gfs-bdp-pds_37")
        );
        assert_eq!(config.intermediate_dir(), Path::new("."));
    }

    #[test]
    fn test_yaml_rejects_bad_level_count() {
        assert!(serde_yaml::from_str::<PipelineConfig>("levels: 12\n").is_err());
    }
}
