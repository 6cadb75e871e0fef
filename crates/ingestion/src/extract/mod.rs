//! Variable extraction.
//!
//! An [`Extractor`] turns one (file, variable, level selector) request into a
//! normalized [`RawRecord`]. Two implementations exist: [`Wgrib2Extractor`]
//! drives the external `wgrib2` tool, [`DirectExtractor`] decodes in-process.
//! Both must produce the same records for the same input.

mod direct;
mod wgrib2;

pub use direct::DirectExtractor;
pub use wgrib2::{level_pattern, netcdf_variable_name, Wgrib2Extractor};

use std::collections::BTreeMap;
use std::path::PathBuf;

use gdas_common::LevelType;
use ndarray::{stack, ArrayD, ArrayViewD, Axis};
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::locator::{CycleFiles, LocatedFile};
use crate::record::RawRecord;
use crate::tables::{LevelSelector, VariableSpec};

/// What to pull out of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub short_name: String,
    pub level_type: LevelType,
    pub levels: LevelSelector,
}

impl ExtractRequest {
    pub fn new(short_name: impl Into<String>, level_type: LevelType, levels: LevelSelector) -> Self {
        Self {
            short_name: short_name.into(),
            level_type,
            levels,
        }
    }

    /// Human-readable level description for errors and logs.
    pub fn level_label(&self) -> String {
        match &self.levels {
            LevelSelector::Single(v) => self.level_type.wgrib2_label(*v),
            LevelSelector::List(vs) => format!("{} {} levels", vs.len(), self.level_type),
        }
    }

    pub(crate) fn decode_error(&self, file: &LocatedFile, reason: impl Into<String>) -> IngestionError {
        IngestionError::Decode {
            file: file.path.clone(),
            variable: self.short_name.clone(),
            level: self.level_label(),
            reason: reason.into(),
        }
    }
}

/// A raw-record decoding strategy.
pub trait Extractor {
    fn name(&self) -> &'static str;

    /// Decode one request. The returned record is normalized.
    fn extract(&mut self, file: &LocatedFile, request: &ExtractRequest) -> Result<RawRecord>;

    /// Intermediate files produced so far, handed over for cleanup.
    fn take_intermediates(&mut self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Extract a whole target variable for one cycle, merging the secondary
/// level family when the spec has one.
pub fn extract_variable(
    extractor: &mut dyn Extractor,
    files: &CycleFiles,
    spec: &VariableSpec,
) -> Result<RawRecord> {
    let file = files.get(spec.family)?;
    let request = ExtractRequest::new(spec.short_name, spec.level_type, spec.levels.clone());
    let primary = extractor.extract(file, &request)?;

    let expected = spec.expected_levels();
    match &spec.secondary {
        Some((family, levels)) => {
            let file = files.get(*family)?;
            let request = ExtractRequest::new(
                spec.short_name,
                spec.level_type,
                LevelSelector::List(levels.clone()),
            );
            let secondary = extractor.extract(file, &request)?;
            combine_levels(spec.name, primary, secondary, &expected)
        }
        None if spec.is_multilevel() && primary.levels != expected => {
            Err(IngestionError::MissingLevels {
                variable: spec.name.to_string(),
                expected,
                found: primary.levels,
            })
        }
        None => Ok(primary),
    }
}

/// Merge two multi-level records into one level axis.
///
/// The result holds the sorted union of both level sets. Where both carry a
/// level the primary record wins. Grids and valid times must agree and the
/// final level axis must equal `expected`.
pub fn combine_levels(
    variable: &str,
    primary: RawRecord,
    secondary: RawRecord,
    expected: &[u32],
) -> Result<RawRecord> {
    let mismatch = |reason: String| IngestionError::CoordinateMismatch {
        variable: variable.to_string(),
        reason,
    };

    if !primary.same_grid(&secondary.latitude, &secondary.longitude) {
        return Err(mismatch(format!(
            "{} and {} are on different grids",
            primary.source.display(),
            secondary.source.display()
        )));
    }
    if primary.valid_time != secondary.valid_time {
        return Err(mismatch(format!(
            "valid times differ ({} vs {})",
            primary.valid_time, secondary.valid_time
        )));
    }
    let primary_data = as_levels(&primary.data);
    let secondary_data = as_levels(&secondary.data);

    // level -> slice, primary inserted last so it wins
    let mut by_level: BTreeMap<u32, ArrayViewD<'_, f32>> = BTreeMap::new();
    for (i, level) in secondary.levels.iter().enumerate() {
        by_level.insert(*level, secondary_data.index_axis(Axis(0), i));
    }
    for (i, level) in primary.levels.iter().enumerate() {
        if by_level.insert(*level, primary_data.index_axis(Axis(0), i)).is_some() {
            debug!(variable = variable, level = level, "Level present in both families, keeping primary");
        }
    }

    let levels: Vec<u32> = by_level.keys().copied().collect();
    if levels != expected {
        return Err(IngestionError::MissingLevels {
            variable: variable.to_string(),
            expected: expected.to_vec(),
            found: levels,
        });
    }

    let views: Vec<ArrayViewD<'_, f32>> = by_level.into_values().collect();
    let data = stack(Axis(0), &views).map_err(|e| mismatch(e.to_string()))?;

    Ok(RawRecord {
        levels,
        data,
        ..primary
    })
}

/// View a record's data with a leading level axis.
fn as_levels(data: &ArrayD<f32>) -> ArrayViewD<'_, f32> {
    if data.ndim() == 2 {
        data.view().insert_axis(Axis(0))
    } else {
        data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ndarray::Array3;

    fn levels_record(levels: &[u32], source: &str) -> RawRecord {
        let mut data = Array3::<f32>::zeros((levels.len(), 2, 2));
        for (i, level) in levels.iter().enumerate() {
            data.index_axis_mut(Axis(0), i).fill(*level as f32);
        }
        RawRecord {
            short_name: "TMP".to_string(),
            level_type: LevelType::Isobaric,
            levels: levels.to_vec(),
            data: data.into_dyn(),
            latitude: vec![0.0, 1.0],
            longitude: vec![0.0, 1.0],
            valid_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            source: PathBuf::from(source),
        }
    }

    #[test]
    fn test_combine_sorted_union() {
        let combined = combine_levels(
            "temperature",
            levels_record(&[100, 200, 300], "a"),
            levels_record(&[150, 250], "b"),
            &[100, 150, 200, 250, 300],
        )
        .unwrap();
        assert_eq!(combined.levels, vec![100, 150, 200, 250, 300]);
        assert_eq!(combined.data.shape(), &[5, 2, 2]);
        assert_eq!(combined.data[[1, 0, 0]], 150.0);
        assert_eq!(combined.source, PathBuf::from("a"));
    }

    #[test]
    fn test_combine_primary_wins_on_overlap() {
        let mut secondary = levels_record(&[200, 250], "b");
        secondary.data.fill(-1.0);
        let combined = combine_levels(
            "temperature",
            levels_record(&[100, 200], "a"),
            secondary,
            &[100, 200, 250],
        )
        .unwrap();
        assert_eq!(combined.data[[1, 1, 1]], 200.0);
        assert_eq!(combined.data[[2, 0, 0]], -1.0);
    }

    #[test]
    fn test_combine_detects_gap() {
        let err = combine_levels(
            "temperature",
            levels_record(&[100, 200], "a"),
            levels_record(&[150], "b"),
            &[100, 150, 200, 250],
        )
        .unwrap_err();
        assert!(matches!(err, IngestionError::MissingLevels { .. }));
    }

    #[test]
    fn test_combine_rejects_grid_mismatch() {
        let mut secondary = levels_record(&[150], "b");
        secondary.longitude = vec![0.5, 1.5];
        let err = combine_levels(
            "temperature",
            levels_record(&[100], "a"),
            secondary,
            &[100, 150],
        )
        .unwrap_err();
        assert!(matches!(err, IngestionError::CoordinateMismatch { .. }));
    }
}
