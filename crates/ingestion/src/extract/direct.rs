//! In-process decoding with `grib2-parser`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grib2_parser::{Grib2Message, Grib2Reader, Grib2Tables};
use ndarray::{stack, Array2, ArrayD, Axis};
use tracing::{debug, warn};

use super::{ExtractRequest, Extractor};
use crate::error::Result;
use crate::locator::LocatedFile;
use crate::record::{coords_match, RawRecord};
use crate::tables::LevelSelector;

/// Decodes GRIB2 files directly.
///
/// The message index of the most recently opened file is kept, so the
/// dozen requests against one analysis file parse it once.
pub struct DirectExtractor {
    tables: Arc<Grib2Tables>,
    cache: Option<(PathBuf, Arc<Vec<Grib2Message>>)>,
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectExtractor {
    pub fn new() -> Self {
        Self::with_tables(Arc::new(Grib2Tables::ncep()))
    }

    pub fn with_tables(tables: Arc<Grib2Tables>) -> Self {
        Self {
            tables,
            cache: None,
        }
    }

    fn messages(&mut self, path: &Path) -> Result<Arc<Vec<Grib2Message>>> {
        if let Some((cached, messages)) = &self.cache {
            if cached == path {
                return Ok(Arc::clone(messages));
            }
        }

        let messages = Arc::new(Grib2Reader::open(path, Arc::clone(&self.tables))?.messages()?);
        debug!(path = %path.display(), messages = messages.len(), "Indexed GRIB2 file");
        self.cache = Some((path.to_path_buf(), Arc::clone(&messages)));
        Ok(messages)
    }
}

impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn extract(&mut self, file: &LocatedFile, request: &ExtractRequest) -> Result<RawRecord> {
        let messages = self.messages(&file.path)?;
        let level_code = request.level_type.code();

        let mut fields: Vec<Array2<f32>> = Vec::new();
        let mut levels = Vec::new();
        let mut grid: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut valid_time: Option<DateTime<Utc>> = None;

        for level in request.levels.values() {
            let candidates: Vec<&Grib2Message> = messages
                .iter()
                .filter(|m| {
                    m.parameter() == request.short_name
                        && m.product_definition.level_type == level_code
                        && request
                            .level_type
                            .conventional_value(m.product_definition.level_value)
                            == Some(level)
                })
                .collect();

            let message = match candidates.as_slice() {
                [] => {
                    return Err(request.decode_error(
                        file,
                        format!("no message at {}", request.level_type.wgrib2_label(level)),
                    ))
                }
                [only] => *only,
                [first, _] => {
                    warn!(
                        file = %file.path.display(),
                        variable = %request.short_name,
                        level = level,
                        "Two candidate messages, using the first in file order"
                    );
                    *first
                }
                many => {
                    return Err(request.decode_error(
                        file,
                        format!(
                            "{} candidate messages at {}",
                            many.len(),
                            request.level_type.wgrib2_label(level)
                        ),
                    ))
                }
            };

            let time = message
                .valid_time()
                .map_err(|e| request.decode_error(file, e.to_string()))?;
            match valid_time {
                None => valid_time = Some(time),
                Some(t) if t != time => {
                    return Err(request.decode_error(
                        file,
                        format!("valid time {} differs from {} at level {}", time, t, level),
                    ))
                }
                Some(_) => {}
            }

            let latitude = message.grid_definition.latitudes();
            let longitude = message.grid_definition.longitudes();
            if let Some((lat, lon)) = &grid {
                if !(coords_match(lat, &latitude) && coords_match(lon, &longitude)) {
                    return Err(request.decode_error(file, format!("grid changes at level {}", level)));
                }
            } else {
                grid = Some((latitude, longitude));
            }

            let values = message
                .unpack_data()
                .map_err(|e| request.decode_error(file, e.to_string()))?;
            let field = Array2::from_shape_vec(message.grid_dims(), values)
                .map_err(|e| request.decode_error(file, e.to_string()))?;
            fields.push(field);
            levels.push(level);
        }

        let (latitude, longitude) = grid.ok_or_else(|| request.decode_error(file, "empty level selection"))?;
        let valid_time = valid_time.ok_or_else(|| request.decode_error(file, "empty level selection"))?;

        let data: ArrayD<f32> = match &request.levels {
            LevelSelector::Single(_) => fields.remove(0).into_dyn(),
            LevelSelector::List(_) => {
                let views: Vec<_> = fields.iter().map(|f| f.view()).collect();
                stack(Axis(0), &views)
                    .map_err(|e| request.decode_error(file, e.to_string()))?
                    .into_dyn()
            }
        };

        RawRecord {
            short_name: request.short_name.clone(),
            level_type: request.level_type,
            levels,
            data,
            latitude,
            longitude,
            valid_time,
            source: file.path.clone(),
        }
        .normalize()
    }
}
