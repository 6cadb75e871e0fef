//! Vertical level conventions used by GDAS records.

use serde::{Deserialize, Serialize};

/// GRIB2 fixed-surface types (code table 4.5) the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LevelType {
    /// Ground or water surface (code 1)
    Surface,
    /// Isobaric surface (code 100)
    #[serde(alias = "isobaricInhPa")]
    Isobaric,
    /// Mean sea level (code 101)
    #[serde(alias = "meanSea")]
    MeanSeaLevel,
    /// Specified height above ground (code 103)
    HeightAboveGround,
}

impl LevelType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LevelType::Surface),
            100 => Some(LevelType::Isobaric),
            101 => Some(LevelType::MeanSeaLevel),
            103 => Some(LevelType::HeightAboveGround),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            LevelType::Surface => 1,
            LevelType::Isobaric => 100,
            LevelType::MeanSeaLevel => 101,
            LevelType::HeightAboveGround => 103,
        }
    }

    /// Level-type name in the eccodes vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            LevelType::Surface => "surface",
            LevelType::Isobaric => "isobaricInhPa",
            LevelType::MeanSeaLevel => "meanSea",
            LevelType::HeightAboveGround => "heightAboveGround",
        }
    }

    /// Convert an SI level value (Pa, m) into the conventional integer level
    /// (hPa for isobaric surfaces, metres otherwise).
    ///
    /// Returns `None` when the value has no exact integer representation,
    /// e.g. the 40 Pa stratospheric level.
    pub fn conventional_value(&self, si_value: f64) -> Option<u32> {
        let value = match self {
            LevelType::Isobaric => si_value / 100.0,
            _ => si_value,
        };
        if value < 0.0 || (value - value.round()).abs() > 1e-6 {
            return None;
        }
        Some(value.round() as u32)
    }

    /// Level label as printed by wgrib2 inventories (`500 mb`, `2 m above ground`).
    pub fn wgrib2_label(&self, value: u32) -> String {
        match self {
            LevelType::Surface => "surface".to_string(),
            LevelType::Isobaric => format!("{} mb", value),
            LevelType::MeanSeaLevel => "mean sea level".to_string(),
            LevelType::HeightAboveGround => format!("{} m above ground", value),
        }
    }
}

impl std::fmt::Display for LevelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
