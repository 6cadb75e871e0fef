//! Decoding through the external `wgrib2` tool.
//!
//! Each request runs
//! `wgrib2 -nc_nlev <N> <file> -match ':<VAR>:' -match '<levels>' -netcdf <out>`
//! and reads the resulting single-variable NetCDF back in.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Timelike;
use gdas_common::LevelType;
use ndarray::{ArrayD, IxDyn};
use netcdf_parser::{read_wgrib2_variable, Wgrib2Field};
use tracing::{debug, info};

use super::{ExtractRequest, Extractor};
use crate::error::{IngestionError, Result};
use crate::locator::LocatedFile;
use crate::record::RawRecord;
use crate::tables::LevelSelector;

/// Runs wgrib2 and loads its NetCDF intermediates.
pub struct Wgrib2Extractor {
    program: PathBuf,
    work_dir: PathBuf,
    level_count: usize,
    intermediates: Vec<PathBuf>,
}

impl Wgrib2Extractor {
    /// `level_count` is the configured table size (13 or 37). It only tags
    /// intermediate names; `-nc_nlev` follows each request's own levels.
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, level_count: usize) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
            level_count,
            intermediates: Vec::new(),
        }
    }

    /// Arguments passed to wgrib2 for one request.
    ///
    /// `-nc_nlev` is the number of levels the level pattern matches, so the
    /// `plevel` axis is never padded.
    pub fn command_args(&self, input: &Path, request: &ExtractRequest, output: &Path) -> Vec<String> {
        vec![
            "-nc_nlev".to_string(),
            request.levels.values().len().to_string(),
            input.display().to_string(),
            "-match".to_string(),
            format!(":{}:", request.short_name),
            "-match".to_string(),
            level_pattern(request.level_type, &request.levels),
            "-netcdf".to_string(),
            output.display().to_string(),
        ]
    }

    /// Intermediate file for a request, unique per variable, level group,
    /// cycle, family and level count.
    pub fn intermediate_path(&self, file: &LocatedFile, request: &ExtractRequest) -> PathBuf {
        self.work_dir.join(format!(
            "{}_{}_{}_{}_{}_{}.nc",
            request.short_name,
            request.level_type,
            request.levels.slug(),
            file.cycle.format("%Y%m%d_%H"),
            file.family.suffix(),
            self.level_count
        ))
    }

    fn run(&self, file: &LocatedFile, request: &ExtractRequest, output: &Path) -> Result<()> {
        let args = self.command_args(&file.path, request, output);
        debug!(program = %self.program.display(), args = ?args, "Running wgrib2");

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                request.decode_error(file, format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !result.status.success() {
            return Err(request.decode_error(
                file,
                format!(
                    "wgrib2 exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }
        if !output.is_file() {
            return Err(request.decode_error(file, format!("wgrib2 wrote no {}", output.display())));
        }
        Ok(())
    }
}

impl Extractor for Wgrib2Extractor {
    fn name(&self) -> &'static str {
        "wgrib2"
    }

    fn extract(&mut self, file: &LocatedFile, request: &ExtractRequest) -> Result<RawRecord> {
        fs::create_dir_all(&self.work_dir)?;
        let output = self.intermediate_path(file, request);
        if output.exists() {
            fs::remove_file(&output)?;
        }

        self.run(file, request, &output)?;
        self.intermediates.push(output.clone());

        let variable = netcdf_variable_name(&request.short_name, request.level_type, &request.levels);
        let field = read_wgrib2_variable(&output, &variable)
            .map_err(|e| request.decode_error(file, e.to_string()))?;

        info!(
            variable = %request.short_name,
            level = %request.level_label(),
            cycle = %file.cycle.format("%Y%m%d%H"),
            hour = file.cycle.hour(),
            "Extracted with wgrib2"
        );
        field_to_record(field, file, request)
    }

    fn take_intermediates(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.intermediates)
    }
}

/// `-match` expression for the requested levels.
pub fn level_pattern(level_type: LevelType, levels: &LevelSelector) -> String {
    match levels {
        LevelSelector::Single(v) => format!(":{}:", level_type.wgrib2_label(*v)),
        LevelSelector::List(vs) => {
            let alternatives: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
            format!(":({}) mb:", alternatives.join("|"))
        }
    }
}

/// Name wgrib2 gives the data variable: `TMP_2maboveground` for single
/// levels, the bare short name when levels are grouped on `plevel`.
pub fn netcdf_variable_name(short_name: &str, level_type: LevelType, levels: &LevelSelector) -> String {
    match levels {
        LevelSelector::Single(v) => {
            format!("{}_{}", short_name, level_type.wgrib2_label(*v).replace(' ', ""))
        }
        LevelSelector::List(_) => short_name.to_string(),
    }
}

/// Reshape a loaded intermediate into `[lat, lon]` or `[level, lat, lon]`.
fn field_to_record(field: Wgrib2Field, file: &LocatedFile, request: &ExtractRequest) -> Result<RawRecord> {
    let Wgrib2Field {
        name,
        dims,
        values,
        latitude,
        longitude,
        plevel,
        plevel_units,
        times,
    } = field;
    let shape_error = |reason: String| IngestionError::Shape {
        variable: name.clone(),
        file: file.path.clone(),
        reason,
    };

    let mut kept: Vec<(String, usize)> = Vec::new();
    for (dim, len) in &dims {
        match dim.as_str() {
            "latitude" | "longitude" => kept.push((dim.clone(), *len)),
            "plevel" if request.levels.is_list() => kept.push((dim.clone(), *len)),
            "time" if *len != 1 => {
                return Err(shape_error(format!("{} time steps in one intermediate", len)))
            }
            _ if *len == 1 => {}
            other => return Err(shape_error(format!("unexpected dimension {} of length {}", other, len))),
        }
    }

    let names: Vec<&str> = kept.iter().map(|(n, _)| n.as_str()).collect();
    let shape: Vec<usize> = match names.as_slice() {
        ["latitude", "longitude"] if request.levels.is_list() => {
            // A single matched level is not given its own axis.
            let mut shape = vec![1];
            shape.extend(kept.iter().map(|(_, l)| *l));
            shape
        }
        ["latitude", "longitude"] | ["plevel", "latitude", "longitude"] => {
            kept.iter().map(|(_, l)| *l).collect()
        }
        other => return Err(shape_error(format!("dimension order {:?}", other))),
    };

    let levels = if request.levels.is_list() {
        let plevel = plevel
            .as_ref()
            .ok_or_else(|| shape_error("no plevel coordinate".to_string()))?;
        let to_pa = match plevel_units.as_deref() {
            Some("hPa") | Some("mb") | Some("millibar") | Some("millibars") => 100.0,
            _ => 1.0,
        };
        plevel
            .iter()
            .map(|p| {
                LevelType::Isobaric
                    .conventional_value(p * to_pa)
                    .ok_or_else(|| shape_error(format!("pressure level {} is not whole hPa", p)))
            })
            .collect::<Result<Vec<u32>>>()?
    } else {
        request.levels.values()
    };

    let valid_time = match times.as_slice() {
        [t] => *t,
        other => return Err(shape_error(format!("{} time values", other.len()))),
    };

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| shape_error(e.to_string()))?;

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
