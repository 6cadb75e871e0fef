//! Normalizer/assembler.
//!
//! Collects the records of every cycle and builds one [`NormalizedDataset`].
//! Static variables are taken from the first cycle that provides them and
//! never overwritten. Every time-varying variable must be added exactly once
//! per cycle.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use gdas_common::CYCLE_INTERVAL_HOURS;
use ndarray::{stack, ArrayD, ArrayViewD, Axis};
use tracing::debug;

use crate::dataset::{DataVariable, NormalizedDataset};
use crate::error::{IngestionError, Result};
use crate::record::{coords_match, RawRecord};
use crate::tables::VariableSpec;

/// Outcome of [`Assembler::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Stored,
    /// A static variable that was already captured.
    SkippedStatic,
}

pub struct Assembler {
    specs: Vec<VariableSpec>,
    levels: Vec<u32>,
    grid: Option<(Vec<f64>, Vec<f64>)>,
    times: Vec<DateTime<Utc>>,
    series: HashMap<&'static str, Vec<ArrayD<f32>>>,
    statics: HashMap<&'static str, ArrayD<f32>>,
    captured: HashSet<&'static str>,
}

impl Assembler {
    /// `levels` is the configured pressure-level table, ascending.
    pub fn new(specs: Vec<VariableSpec>, levels: Vec<u32>) -> Self {
        Self {
            specs,
            levels,
            grid: None,
            times: Vec::new(),
            series: HashMap::new(),
            statics: HashMap::new(),
            captured: HashSet::new(),
        }
    }

    pub fn specs(&self) -> &[VariableSpec] {
        &self.specs
    }

    /// Start collecting records for `cycle`.
    ///
    /// Cycles must arrive in chronological order, one interval apart, and
    /// the previous cycle must be complete.
    pub fn begin_cycle(&mut self, cycle: DateTime<Utc>) -> Result<()> {
        if let Some(&last) = self.times.last() {
            if cycle - last != Duration::hours(CYCLE_INTERVAL_HOURS) {
                return Err(IngestionError::CoordinateMismatch {
                    variable: "time".to_string(),
                    reason: format!("cycle {} does not follow {}", cycle, last),
                });
            }
            self.check_complete(last)?;
        }
        self.times.push(cycle);
        Ok(())
    }

    /// Whether a static variable already has its value.
    pub fn is_captured(&self, name: &str) -> bool {
        self.captured.contains(name)
    }

    /// Add the record of `spec` for the current cycle.
    pub fn add(&mut self, spec: &VariableSpec, record: RawRecord) -> Result<Capture> {
        let mismatch = |reason: String| IngestionError::CoordinateMismatch {
            variable: spec.name.to_string(),
            reason,
        };

        let cycle = *self
            .times
            .last()
            .ok_or_else(|| mismatch("record added before any cycle".to_string()))?;

        if spec.static_field && self.captured.contains(spec.name) {
            debug!(variable = spec.name, cycle = %cycle, "Static variable already captured, skipping");
            return Ok(Capture::SkippedStatic);
        }

        if record.valid_time != cycle {
            return Err(mismatch(format!(
                "valid time {} from {} is not cycle {}",
                record.valid_time,
                record.source.display(),
                cycle
            )));
        }

        match &self.grid {
            Some((lat, lon)) => {
                if !(coords_match(lat, &record.latitude) && coords_match(lon, &record.longitude)) {
                    return Err(mismatch(format!(
                        "grid of {} differs from earlier records",
                        record.source.display()
                    )));
                }
            }
            None => self.grid = Some((record.latitude.clone(), record.longitude.clone())),
        }

        if spec.is_multilevel() {
            if record.levels != self.levels || record.data.ndim() != 3 {
                return Err(IngestionError::MissingLevels {
                    variable: spec.name.to_string(),
                    expected: self.levels.clone(),
                    found: record.levels,
                });
            }
        } else if record.data.ndim() != 2 {
            return Err(IngestionError::Shape {
                variable: spec.name.to_string(),
                file: record.source,
                reason: format!("expected a 2-D field, got shape {:?}", record.data.shape()),
            });
        }

        if spec.static_field {
            self.statics.insert(spec.name, record.data);
            self.captured.insert(spec.name);
            return Ok(Capture::Stored);
        }

        let steps = self.series.entry(spec.name).or_default();
        if steps.len() >= self.times.len() {
            return Err(mismatch(format!("added twice for cycle {}", cycle)));
        }
        steps.push(record.data);
        Ok(Capture::Stored)
    }

    fn check_complete(&self, cycle: DateTime<Utc>) -> Result<()> {
        let expected = self.times.len();
        for spec in self.specs.iter().filter(|s| !s.static_field) {
            let have = self.series.get(spec.name).map_or(0, Vec::len);
            if have != expected {
                return Err(IngestionError::MissingVariable {
                    variable: spec.name.to_string(),
                    cycle: cycle.format("%Y%m%d%H").to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build the dataset: stack time, add `batch`, apply unit conversions.
    pub fn finish(mut self) -> Result<NormalizedDataset> {
        let first = *self.times.first().ok_or_else(|| {
            IngestionError::InvalidConfig("no cycles were assembled".to_string())
        })?;
        let last = *self.times.last().unwrap_or(&first);
        self.check_complete(last)?;

        let (latitude, longitude) = self.grid.take().unwrap_or_default();

        let mut variables = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let (dims, mut data) = if spec.static_field {
                let data = self.statics.remove(spec.name).ok_or_else(|| {
                    IngestionError::MissingVariable {
                        variable: spec.name.to_string(),
                        cycle: first.format("%Y%m%d%H").to_string(),
                    }
                })?;
                (vec!["lat", "lon"], data)
            } else {
                let steps = self.series.remove(spec.name).unwrap_or_default();
                let views: Vec<ArrayViewD<'_, f32>> = steps.iter().map(|a| a.view()).collect();
                let stacked = stack(Axis(0), &views).map_err(|e| IngestionError::Shape {
                    variable: spec.name.to_string(),
                    file: Default::default(),
                    reason: e.to_string(),
                })?;
                let data = stacked.insert_axis(Axis(0));
                let dims = if spec.is_multilevel() {
                    vec!["batch", "time", "level", "lat", "lon"]
                } else {
                    vec!["batch", "time", "lat", "lon"]
                };
                (dims, data)
            };

            let conversion = spec.conversion;
            data.mapv_inplace(|v| conversion.apply(v));

            variables.push(DataVariable {
                name: spec.name.to_string(),
                dims,
                data,
                units: spec.units.to_string(),
                long_name: spec.long_name.to_string(),
            });
        }

        Ok(NormalizedDataset {
            time: self.times.iter().map(|t| (*t - first).num_hours()).collect(),
            datetime: self.times,
            level: self.levels.iter().map(|&l| l as i32).collect(),
            lat: latitude.iter().map(|&v| v as f32).collect(),
            lon: longitude.iter().map(|&v| v as f32).collect(),
            variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MslpSource, PressureLevels};
    use crate::tables::variable_table;
    use chrono::TimeZone;
    use ndarray::{Array2, Array3};
    use std::path::PathBuf;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn record_for(spec: &VariableSpec, time: DateTime<Utc>, value: f32) -> RawRecord {
        let data = if spec.is_multilevel() {
            Array3::from_elem((13, 2, 3), value).into_dyn()
        } else {
            Array2::from_elem((2, 3), value).into_dyn()
        };
        RawRecord {
            short_name: spec.short_name.to_string(),
            level_type: spec.level_type,
            levels: spec.expected_levels(),
            data,
            latitude: vec![-1.0, 1.0],
            longitude: vec![0.0, 1.0, 2.0],
            valid_time: time,
            source: PathBuf::from("fixture"),
        }
    }

    fn assembler() -> Assembler {
        Assembler::new(
            variable_table(PressureLevels::L13, MslpSource::Prmsl),
            PressureLevels::L13.all(),
        )
    }

    fn add_cycle(asm: &mut Assembler, time: DateTime<Utc>, value: f32) {
        asm.begin_cycle(time).unwrap();
        for spec in asm.specs().to_vec() {
            asm.add(&spec, record_for(&spec, time, value)).unwrap();
        }
    }

    #[test]
    fn test_statics_come_from_first_cycle() {
        let mut asm = assembler();
        add_cycle(&mut asm, t(0), 1.0);
        assert!(asm.is_captured("land_sea_mask"));
        add_cycle(&mut asm, t(6), 0.0);
        let ds = asm.finish().unwrap();

        let lsm = ds.variable("land_sea_mask").unwrap();
        assert_eq!(lsm.dims, vec!["lat", "lon"]);
        assert!(lsm.data.iter().all(|&v| v == 1.0));

        let t2m = ds.variable("2m_temperature").unwrap();
        assert_eq!(t2m.data.shape(), &[1, 2, 2, 3]);
        assert_eq!(t2m.data[[0, 1, 0, 0]], 0.0);
    }

    #[test]
    fn test_time_is_hours_from_first_step() {
        let mut asm = assembler();
        for (i, hour) in [0, 6, 12].into_iter().enumerate() {
            add_cycle(&mut asm, t(hour), i as f32);
        }
        let ds = asm.finish().unwrap();
        assert_eq!(ds.time, vec![0, 6, 12]);
        assert_eq!(ds.datetime[2], t(12));
        assert_eq!(ds.level.len(), 13);
        assert_eq!(ds.variables.len(), 13);
    }

    #[test]
    fn test_unit_conversions_applied() {
        let mut asm = assembler();
        add_cycle(&mut asm, t(0), 1000.0);
        let ds = asm.finish().unwrap();

        let z = ds.variable("geopotential").unwrap();
        assert_eq!(z.dims, vec!["batch", "time", "level", "lat", "lon"]);
        assert!((z.data[[0, 0, 0, 0, 0]] - 9806.65).abs() < 1e-2);

        let tp = ds.variable("total_precipitation_6hr").unwrap();
        assert!((tp.data[[0, 0, 1, 2]] - 1.0).abs() < 1e-6);

        let zs = ds.variable("geopotential_at_surface").unwrap();
        assert!((zs.data[[0, 0]] - 9806.65).abs() < 1e-2);
    }

    #[test]
    fn test_missing_variable_fails() {
        let mut asm = assembler();
        asm.begin_cycle(t(0)).unwrap();
        for spec in asm.specs().to_vec().into_iter().filter(|s| s.name != "temperature") {
            asm.add(&spec, record_for(&spec, t(0), 1.0)).unwrap();
        }
        let err = asm.finish().unwrap_err();
        assert!(matches!(err, IngestionError::MissingVariable { ref variable, .. } if variable == "temperature"));
    }

    #[test]
    fn test_wrong_valid_time_rejected() {
        let mut asm = assembler();
        asm.begin_cycle(t(6)).unwrap();
        let spec = asm.specs()[2].clone();
        let err = asm.add(&spec, record_for(&spec, t(0), 1.0)).unwrap_err();
        assert!(matches!(err, IngestionError::CoordinateMismatch { .. }));
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let mut asm = assembler();
        asm.begin_cycle(t(0)).unwrap();
        let specs = asm.specs().to_vec();
        asm.add(&specs[2], record_for(&specs[2], t(0), 1.0)).unwrap();
        let mut shifted = record_for(&specs[3], t(0), 1.0);
        shifted.longitude = vec![0.5, 1.5, 2.5];
        assert!(asm.add(&specs[3], shifted).is_err());
    }

    #[test]
    fn test_cycles_must_be_consecutive() {
        let mut asm = assembler();
        add_cycle(&mut asm, t(6), 1.0);
        assert!(asm.begin_cycle(t(0)).is_err());
    }
}
