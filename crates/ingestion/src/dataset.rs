//! The assembled GraphCast input dataset.

use chrono::{DateTime, Duration, Utc};
use gdas_common::CYCLE_INTERVAL_HOURS;
use ndarray::ArrayD;

/// One data variable of the dataset.
#[derive(Debug, Clone)]
pub struct DataVariable {
    pub name: String,
    /// Dimension names, outermost first.
    pub dims: Vec<&'static str>,
    pub data: ArrayD<f32>,
    pub units: String,
    pub long_name: String,
}

impl DataVariable {
    pub fn is_static(&self) -> bool {
        !self.dims.contains(&"time")
    }
}

/// Dimensions `batch` (1), `time`, `level`, `lat`, `lon` plus the
/// variables in table order.
#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    /// Absolute valid time of each step.
    pub datetime: Vec<DateTime<Utc>>,
    /// Hours since the first step.
    pub time: Vec<i64>,
    /// Pressure levels in hPa, ascending.
    pub level: Vec<i32>,
    pub lat: Vec<f32>,
    pub lon: Vec<f32>,
    pub variables: Vec<DataVariable>,
}

impl NormalizedDataset {
    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn steps(&self) -> usize {
        self.time.len()
    }

    /// Forecast initialisation the dataset feeds: one cycle after the first step.
    pub fn forecast_init(&self) -> Option<DateTime<Utc>> {
        self.datetime
            .first()
            .map(|t| *t + Duration::hours(CYCLE_INTERVAL_HOURS))
    }

    /// `source-gdas_date-<YYYYMMDDHH>_res-0.25_levels-<n>_steps-<N>.nc`
    pub fn output_file_name(&self) -> String {
        let date = self
            .forecast_init()
            .map(|t| t.format("%Y%m%d%H").to_string())
            .unwrap_or_default();
        format!(
            "source-gdas_date-{}_res-0.25_levels-{}_steps-{}.nc",
            date,
            self.level.len(),
            self.steps()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_output_file_name() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let dataset = NormalizedDataset {
            datetime: vec![t0, t0 + Duration::hours(6)],
            time: vec![0, 6],
            level: vec![50; 13],
            lat: vec![],
            lon: vec![],
            variables: vec![],
        };
        assert_eq!(
            dataset.output_file_name(),
            "source-gdas_date-2024010106_res-0.25_levels-13_steps-2.nc"
        );
    }
}
