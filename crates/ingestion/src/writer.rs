//! NetCDF output and cleanup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::dataset::NormalizedDataset;
use crate::error::Result;

/// Writes datasets into an output directory.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `dataset` and return the final path.
    ///
    /// Data goes to `<name>.partial` first and is renamed once complete.
    pub fn write(&self, dataset: &NormalizedDataset) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let name = dataset.output_file_name();
        let final_path = self.output_dir.join(&name);
        let partial = self.output_dir.join(format!("{}.partial", name));

        if partial.exists() {
            fs::remove_file(&partial)?;
        }

        if let Err(e) = write_netcdf(&partial, dataset) {
            if let Err(cleanup) = fs::remove_file(&partial) {
                debug!(path = %partial.display(), error = %cleanup, "No partial output to remove");
            }
            return Err(e);
        }

        fs::rename(&partial, &final_path)?;
        info!(
            path = %final_path.display(),
            steps = dataset.steps(),
            variables = dataset.variables.len(),
            "Wrote dataset"
        );
        Ok(final_path)
    }
}

fn write_netcdf(path: &Path, dataset: &NormalizedDataset) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("batch", 1)?;
    file.add_dimension("time", dataset.time.len())?;
    file.add_dimension("level", dataset.level.len())?;
    file.add_dimension("lat", dataset.lat.len())?;
    file.add_dimension("lon", dataset.lon.len())?;

    file.add_attribute("source", "NCEP GDAS 0.25 degree analysis")?;
    file.add_attribute("Conventions", "CF-1.6")?;
    file.add_attribute(
        "history",
        format!("Created on {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
    )?;

    // Coordinates
    {
        let mut var = file.add_variable::<f32>("lat", &["lat"])?;
        var.put_attribute("units", "degrees_north")?;
        var.put_attribute("long_name", "latitude")?;
        var.put_values(&dataset.lat, ..)?;
    }
    {
        let mut var = file.add_variable::<f32>("lon", &["lon"])?;
        var.put_attribute("units", "degrees_east")?;
        var.put_attribute("long_name", "longitude")?;
        var.put_values(&dataset.lon, ..)?;
    }
    {
        let mut var = file.add_variable::<i32>("level", &["level"])?;
        var.put_attribute("units", "millibars")?;
        var.put_attribute("long_name", "pressure level")?;
        var.put_values(&dataset.level, ..)?;
    }
    {
        let mut var = file.add_variable::<i64>("time", &["time"])?;
        var.put_attribute("units", "hours")?;
        var.put_attribute("long_name", "time since first step")?;
        var.put_values(&dataset.time, ..)?;
    }
    {
        let hours: Vec<i64> = dataset
            .datetime
            .iter()
            .map(|t| t.timestamp() / 3600)
            .collect();
        let mut var = file.add_variable::<i64>("datetime", &["batch", "time"])?;
        var.put_attribute("units", "hours since 1970-01-01 00:00:00")?;
        var.put_attribute("calendar", "proleptic_gregorian")?;
        var.put_values(&hours, ..)?;
    }

    for variable in &dataset.variables {
        let mut var = file.add_variable::<f32>(&variable.name, &variable.dims)?;
        var.put_attribute("units", variable.units.as_str())?;
        var.put_attribute("long_name", variable.long_name.as_str())?;
        if !variable.is_static() {
            var.put_attribute("coordinates", "datetime")?;
        }
        let values: Vec<f32> = variable.data.iter().copied().collect();
        var.put_values(&values, ..)?;
        debug!(variable = %variable.name, shape = ?variable.data.shape(), "Wrote variable");
    }

    Ok(())
}

/// Remove intermediate files, returning how many were deleted.
pub fn cleanup_intermediates(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate"),
        }
    }
    removed
}

/// Remove the raw download tree.
pub fn remove_raw_tree(root: &Path) -> Result<bool> {
    if !root.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(root)?;
    info!(path = %root.display(), "Removed raw data tree");
    Ok(true)
}
