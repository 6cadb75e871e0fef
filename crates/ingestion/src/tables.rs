//! Static variable table for the GraphCast input vocabulary.
//!
//! Each target variable is described once by a [`VariableSpec`]: where its
//! source record lives, which levels to pull, whether it is time-invariant
//! and how its units are converted. The table is fixed by the level count
//! and the MSLP source before any file is read.

use std::fmt;

use gdas_common::LevelType;
use tracing::warn;

use crate::config::{MslpSource, PressureLevels};

/// Standard gravity, m s**-2.
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Density of liquid water used to turn kg m**-2 into metres.
pub const WATER_DENSITY: f32 = 1000.0;

/// File families of a GDAS cycle directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileFamily {
    /// `pgrb2.0p25.f000`, the analysis.
    Analysis,
    /// `pgrb2b.0p25.f000`, the extra 37-level pressure levels.
    AnalysisB,
    /// `pgrb2.0p25.f006` of the previous cycle.
    Accumulation,
}

impl FileFamily {
    /// File name suffix after `gdas.tHHz.`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FileFamily::Analysis => "pgrb2.0p25.f000",
            FileFamily::AnalysisB => "pgrb2b.0p25.f000",
            FileFamily::Accumulation => "pgrb2.0p25.f006",
        }
    }

    /// Offset from the served cycle to the run that produced the file.
    pub fn source_offset_hours(&self) -> i64 {
        match self {
            FileFamily::Accumulation => -6,
            _ => 0,
        }
    }

    pub fn forecast_hour(&self) -> u32 {
        match self {
            FileFamily::Accumulation => 6,
            _ => 0,
        }
    }

    /// Families a run needs for the given level count.
    pub fn families_for(levels: PressureLevels) -> Vec<FileFamily> {
        match levels {
            PressureLevels::L13 => vec![FileFamily::Analysis, FileFamily::Accumulation],
            PressureLevels::L37 => vec![
                FileFamily::Analysis,
                FileFamily::AnalysisB,
                FileFamily::Accumulation,
            ],
        }
    }
}

impl fmt::Display for FileFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Requested level value(s) in conventional units (hPa, m).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelSelector {
    Single(u32),
    List(Vec<u32>),
}

impl LevelSelector {
    pub fn values(&self) -> Vec<u32> {
        match self {
            LevelSelector::Single(v) => vec![*v],
            LevelSelector::List(vs) => vs.clone(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, LevelSelector::List(_))
    }

    /// Short form used in intermediate file names and log lines.
    pub fn slug(&self) -> String {
        match self {
            LevelSelector::Single(v) => v.to_string(),
            LevelSelector::List(vs) => match (vs.first(), vs.last()) {
                (Some(first), Some(last)) => format!("{}-{}x{}", first, last, vs.len()),
                _ => "none".to_string(),
            },
        }
    }
}

/// Unit conversion applied during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitConversion {
    None,
    /// Geopotential height (gpm) to geopotential (m**2 s**-2).
    GeopotentialHeight,
    /// kg m**-2 of water to metres.
    KgPerM2ToMetres,
}

impl UnitConversion {
    pub fn apply(&self, value: f32) -> f32 {
        match self {
            UnitConversion::None => value,
            UnitConversion::GeopotentialHeight => value * STANDARD_GRAVITY,
            UnitConversion::KgPerM2ToMetres => value / WATER_DENSITY,
        }
    }

    pub fn invert(&self, value: f32) -> f32 {
        match self {
            UnitConversion::None => value,
            UnitConversion::GeopotentialHeight => value / STANDARD_GRAVITY,
            UnitConversion::KgPerM2ToMetres => value * WATER_DENSITY,
        }
    }
}

/// How to obtain one target variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Target name in the output vocabulary.
    pub name: &'static str,
    /// GRIB2 short name of the source record.
    pub short_name: &'static str,
    pub family: FileFamily,
    pub level_type: LevelType,
    pub levels: LevelSelector,
    /// Extra levels from another family, merged into the level axis.
    pub secondary: Option<(FileFamily, Vec<u32>)>,
    /// Captured from the first cycle only, no time dimension.
    pub static_field: bool,
    pub conversion: UnitConversion,
    pub units: &'static str,
    pub long_name: &'static str,
}

impl VariableSpec {
    pub fn is_multilevel(&self) -> bool {
        self.levels.is_list()
    }

    /// Level set the assembled variable must carry, ascending.
    pub fn expected_levels(&self) -> Vec<u32> {
        let mut levels = self.levels.values();
        if let Some((_, secondary)) = &self.secondary {
            levels.extend_from_slice(secondary);
        }
        levels.sort_unstable();
        levels.dedup();
        levels
    }
}

fn surface(
    name: &'static str,
    short_name: &'static str,
    family: FileFamily,
    level_type: LevelType,
    level: u32,
    units: &'static str,
    long_name: &'static str,
) -> VariableSpec {
    VariableSpec {
        name,
        short_name,
        family,
        level_type,
        levels: LevelSelector::Single(level),
        secondary: None,
        static_field: false,
        conversion: UnitConversion::None,
        units,
        long_name,
    }
}

fn isobaric(
    name: &'static str,
    short_name: &'static str,
    levels: PressureLevels,
    units: &'static str,
    long_name: &'static str,
) -> VariableSpec {
    VariableSpec {
        name,
        short_name,
        family: FileFamily::Analysis,
        level_type: LevelType::Isobaric,
        levels: LevelSelector::List(levels.primary().to_vec()),
        secondary: levels
            .secondary()
            .map(|s| (FileFamily::AnalysisB, s.to_vec())),
        static_field: false,
        conversion: UnitConversion::None,
        units,
        long_name,
    }
}

/// Build the 13-entry variable table.
pub fn variable_table(levels: PressureLevels, mslp: MslpSource) -> Vec<VariableSpec> {
    use FileFamily::*;
    use LevelType::*;

    let mslp_spec = match mslp {
        MslpSource::Prmsl => surface(
            "mean_sea_level_pressure",
            "PRMSL",
            Analysis,
            MeanSeaLevel,
            0,
            "Pa",
            "Mean sea level pressure",
        ),
        MslpSource::SurfacePressure => {
            warn!("mean_sea_level_pressure will be filled from surface pressure (PRES), not PRMSL");
            surface(
                "mean_sea_level_pressure",
                "PRES",
                Analysis,
                Surface,
                0,
                "Pa",
                "Mean sea level pressure",
            )
        }
    };

    vec![
        // Time-invariant
        VariableSpec {
            static_field: true,
            conversion: UnitConversion::GeopotentialHeight,
            ..surface(
                "geopotential_at_surface",
                "HGT",
                Analysis,
                Surface,
                0,
                "m**2 s**-2",
                "Geopotential at surface",
            )
        },
        VariableSpec {
            static_field: true,
            ..surface(
                "land_sea_mask",
                "LAND",
                Accumulation,
                Surface,
                0,
                "(0 - 1)",
                "Land-sea mask",
            )
        },
        // Single level
        mslp_spec,
        surface(
            "2m_temperature",
            "TMP",
            Analysis,
            HeightAboveGround,
            2,
            "K",
            "2 metre temperature",
        ),
        surface(
            "10m_u_component_of_wind",
            "UGRD",
            Analysis,
            HeightAboveGround,
            10,
            "m s**-1",
            "10 metre U wind component",
        ),
        surface(
            "10m_v_component_of_wind",
            "VGRD",
            Analysis,
            HeightAboveGround,
            10,
            "m s**-1",
            "10 metre V wind component",
        ),
        VariableSpec {
            conversion: UnitConversion::KgPerM2ToMetres,
            ..surface(
                "total_precipitation_6hr",
                "APCP",
                Accumulation,
                Surface,
                0,
                "m",
                "Total precipitation over 6 hours",
            )
        },
        // Pressure levels
        VariableSpec {
            conversion: UnitConversion::GeopotentialHeight,
            ..isobaric("geopotential", "HGT", levels, "m**2 s**-2", "Geopotential")
        },
        isobaric("temperature", "TMP", levels, "K", "Temperature"),
        isobaric(
            "specific_humidity",
            "SPFH",
            levels,
            "kg kg**-1",
            "Specific humidity",
        ),
        isobaric(
            "vertical_velocity",
            "VVEL",
            levels,
            "Pa s**-1",
            "Vertical velocity",
        ),
        isobaric(
            "u_component_of_wind",
            "UGRD",
            levels,
            "m s**-1",
            "U component of wind",
        ),
        isobaric(
            "v_component_of_wind",
            "VGRD",
            levels,
            "m s**-1",
            "V component of wind",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_thirteen_unique_targets() {
        let table = variable_table(PressureLevels::L13, MslpSource::Prmsl);
        assert_eq!(table.len(), 13);
        let names: HashSet<_> = table.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 13);

        let statics: Vec<_> = table.iter().filter(|s| s.static_field).map(|s| s.name).collect();
        assert_eq!(statics, vec!["geopotential_at_surface", "land_sea_mask"]);
    }

    #[test]
    fn test_37_level_specs_carry_secondary_family() {
        let table = variable_table(PressureLevels::L37, MslpSource::Prmsl);
        let temperature = table.iter().find(|s| s.name == "temperature").unwrap();
        let (family, levels) = temperature.secondary.as_ref().unwrap();
        assert_eq!(*family, FileFamily::AnalysisB);
        assert_eq!(levels.len(), 6);
        assert_eq!(temperature.expected_levels(), PressureLevels::L37.all());
    }

    #[test]
    fn test_mslp_source_switch() {
        let table = variable_table(PressureLevels::L13, MslpSource::SurfacePressure);
        let mslp = table
            .iter()
            .find(|s| s.name == "mean_sea_level_pressure")
            .unwrap();
        assert_eq!(mslp.short_name, "PRES");
        assert_eq!(mslp.level_type, LevelType::Surface);
    }

    #[test]
    fn test_unit_conversions_invert() {
        let g = UnitConversion::GeopotentialHeight;
        assert!((g.apply(1000.0) - 9806.65).abs() < 1e-2);
        assert!((g.invert(g.apply(5500.0)) - 5500.0).abs() < 1e-3);
        assert_eq!(UnitConversion::KgPerM2ToMetres.apply(5.0), 0.005);
    }

    #[test]
    fn test_level_slug() {
        assert_eq!(LevelSelector::Single(2).slug(), "2");
        assert_eq!(
            LevelSelector::List(vec![50, 100, 1000]).slug(),
            "50-1000x3"
        );
    }

    #[test]
    fn test_accumulation_family_is_previous_cycle() {
        assert_eq!(FileFamily::Accumulation.source_offset_hours(), -6);
        assert_eq!(FileFamily::Accumulation.forecast_hour(), 6);
        assert_eq!(FileFamily::families_for(PressureLevels::L37).len(), 3);
    }
}
