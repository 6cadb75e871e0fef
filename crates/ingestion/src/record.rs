//! Decoded raw records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use gdas_common::LevelType;
use ndarray::{ArrayD, Axis};

use crate::error::{IngestionError, Result};

/// Tolerance for comparing coordinate values, in degrees.
pub const COORD_TOLERANCE: f64 = 1e-5;

/// One decoded record: a 2-D `[lat, lon]` or 3-D `[level, lat, lon]` field
/// with its coordinates.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub short_name: String,
    pub level_type: LevelType,
    /// Conventional level values (hPa, m). One entry for 2-D records.
    pub levels: Vec<u32>,
    pub data: ArrayD<f32>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub valid_time: DateTime<Utc>,
    /// File the record came from.
    pub source: PathBuf,
}

impl RawRecord {
    pub fn is_multilevel(&self) -> bool {
        self.data.ndim() == 3
    }

    /// Validate the shape and bring the record into canonical order:
    /// latitude increasing, levels ascending and unique. Longitude keeps the
    /// source order, which may wrap through 0°.
    pub fn normalize(mut self) -> Result<Self> {
        let ndim = self.data.ndim();
        let shape = self.data.shape().to_vec();

        if ndim != 2 && ndim != 3 {
            return Err(self.shape_error(format!("rank {} (expected 2 or 3)", ndim)));
        }
        if shape[ndim - 2] != self.latitude.len() || shape[ndim - 1] != self.longitude.len() {
            return Err(self.shape_error(format!(
                "data {:?} does not match {} latitudes x {} longitudes",
                shape,
                self.latitude.len(),
                self.longitude.len()
            )));
        }
        let level_count = if ndim == 3 { shape[0] } else { 1 };
        if self.levels.len() != level_count {
            return Err(self.shape_error(format!(
                "{} level values for {} levels of data",
                self.levels.len(),
                level_count
            )));
        }

        // North-to-south sources
        if is_decreasing(&self.latitude) {
            self.latitude.reverse();
            self.data.invert_axis(Axis(ndim - 2));
        }
        if !is_strictly_increasing(&self.latitude) {
            return Err(self.shape_error("latitude is not monotonic".to_string()));
        }

        if ndim == 3 {
            let mut order: Vec<usize> = (0..self.levels.len()).collect();
            order.sort_by_key(|&i| self.levels[i]);
            let sorted: Vec<u32> = order.iter().map(|&i| self.levels[i]).collect();
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                return Err(self.shape_error(format!("duplicate levels in {:?}", self.levels)));
            }
            if order.iter().enumerate().any(|(pos, &i)| pos != i) {
                self.data = self.data.select(Axis(0), &order);
                self.levels = sorted;
            }
        }

        Ok(self)
    }

    /// Whether `other` lies on the same horizontal grid.
    pub fn same_grid(&self, latitude: &[f64], longitude: &[f64]) -> bool {
        coords_match(&self.latitude, latitude) && coords_match(&self.longitude, longitude)
    }

    fn shape_error(&self, reason: String) -> IngestionError {
        IngestionError::Shape {
            variable: self.short_name.clone(),
            file: self.source.clone(),
            reason,
        }
    }
}

/// Element-wise comparison within [`COORD_TOLERANCE`].
pub fn coords_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= COORD_TOLERANCE)
}

fn is_decreasing(values: &[f64]) -> bool {
    values.len() > 1 && values[0] > values[values.len() - 1]
}

fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
