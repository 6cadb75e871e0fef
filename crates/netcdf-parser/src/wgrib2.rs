//! Reader for the single-variable files written by `wgrib2 -netcdf`.
//!
//! wgrib2 lays these out with coordinate variables `time`, `latitude`,
//! `longitude` and, when `-nc_nlev` groups levels, `plevel`. The data
//! variable is named `<VAR>_<level>` (e.g. `TMP_2maboveground`) or just
//! `<VAR>` when it carries a `plevel` axis.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{dimensions_of, get_f64_attr, get_string_attr, read_f64_variable, silence_hdf5_errors};

/// One variable loaded from a wgrib2 intermediate.
#[derive(Debug, Clone)]
pub struct Wgrib2Field {
    pub name: String,
    /// Dimension names and lengths of the data variable, outermost first.
    pub dims: Vec<(String, usize)>,
    /// Values in row-major order over `dims`. Fill values are NaN.
    pub values: Vec<f32>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub plevel: Option<Vec<f64>>,
    pub plevel_units: Option<String>,
    pub times: Vec<DateTime<Utc>>,
}

impl Wgrib2Field {
    /// Length of a named dimension of the data variable.
    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.iter().find(|(n, _)| n == name).map(|(_, len)| *len)
    }
}

/// Load `variable` and its coordinates from a wgrib2 NetCDF file.
pub fn read_wgrib2_variable(path: &Path, variable: &str) -> NetCdfResult<Wgrib2Field> {
    silence_hdf5_errors();

    let file = netcdf::open(path)?;

    let var = match file.variable(variable) {
        Some(var) => var,
        None => {
            let available: Vec<String> = file.variables().map(|v| v.name()).collect();
            return Err(NetCdfError::MissingData(format!(
                "variable '{}' not in {} (found: {})",
                variable,
                path.display(),
                available.join(", ")
            )));
        }
    };

    let dims = dimensions_of(&var);
    let raw: Vec<f32> = var.get_values(..)?;
    let fill = get_f64_attr(&var, "_FillValue");
    let values = match fill {
        Some(fill) => raw
            .into_iter()
            .map(|v| if (v as f64 - fill).abs() <= fill.abs() * 1e-6 { f32::NAN } else { v })
            .collect(),
        None => raw,
    };

    let (latitude, _) = read_f64_variable(&file, "latitude")?;
    let (longitude, _) = read_f64_variable(&file, "longitude")?;

    let (plevel, plevel_units) = match file.variable("plevel") {
        Some(level_var) => {
            let units = get_string_attr(&level_var, "units");
            let values: Vec<f64> = level_var.get_values(..)?;
            (Some(values), units)
        }
        None => (None, None),
    };

    let times = match file.variable("time") {
        Some(time_var) => {
            let units = get_string_attr(&time_var, "units").ok_or_else(|| {
                NetCdfError::MissingData(format!("units of time in {}", path.display()))
            })?;
            let raw: Vec<f64> = time_var.get_values(..)?;
            decode_time_units(&raw, &units)?
        }
        None => Vec::new(),
    };

    debug!(
        path = %path.display(),
        variable = variable,
        dims = ?dims,
        "Loaded wgrib2 intermediate"
    );

    Ok(Wgrib2Field {
        name: variable.to_string(),
        dims,
        values,
        latitude,
        longitude,
        plevel,
        plevel_units,
        times,
    })
}

/// Decode CF time values such as `seconds since 1970-01-01 00:00:00.0 0:00`.
pub fn decode_time_units(values: &[f64], units: &str) -> NetCdfResult<Vec<DateTime<Utc>>> {
    let invalid = || NetCdfError::InvalidFormat(format!("unsupported time units '{}'", units));

    let (unit, origin) = units.split_once(" since ").ok_or_else(invalid)?;
    let seconds_per_unit = match unit.trim() {
        "seconds" | "second" | "s" => 1.0,
        "minutes" | "minute" => 60.0,
        "hours" | "hour" | "h" => 3600.0,
        "days" | "day" => 86400.0,
        _ => return Err(invalid()),
    };

    let mut parts = origin.split_whitespace();
    let date = parts
        .next()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(invalid)?;
    let time = match parts.next() {
        Some(t) => {
            let whole = t.split('.').next().unwrap_or(t);
            NaiveTime::parse_from_str(whole, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(whole, "%H:%M"))
                .map_err(|_| invalid())?
        }
        None => NaiveTime::default(),
    };
    let origin = Utc.from_utc_datetime(&NaiveDateTime::new(date, time));

    Ok(values
        .iter()
        .map(|v| origin + Duration::milliseconds((v * seconds_per_unit * 1000.0).round() as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wgrib2_time_units() {
        let times = decode_time_units(
            &[1_704_067_200.0],
            "seconds since 1970-01-01 00:00:00.0 0:00",
        )
        .unwrap();
        assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_decode_hours_since() {
        let times = decode_time_units(&[0.0, 6.0], "hours since 2024-01-01").unwrap();
        assert_eq!(times[1], Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_unsupported_units() {
        assert!(decode_time_units(&[1.0], "fortnights since 2024-01-01").is_err());
        assert!(decode_time_units(&[1.0], "seconds").is_err());
    }

    #[test]
    fn test_read_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("time", 1).unwrap();
            file.add_dimension("latitude", 2).unwrap();
            file.add_dimension("longitude", 3).unwrap();

            let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
            time.put_attribute("units", "seconds since 1970-01-01 00:00:00.0 0:00")
                .unwrap();
            time.put_values(&[1_704_088_800.0], ..).unwrap();

            let mut lat = file.add_variable::<f64>("latitude", &["latitude"]).unwrap();
            lat.put_values(&[1.0, 0.0], ..).unwrap();
            let mut lon = file.add_variable::<f64>("longitude", &["longitude"]).unwrap();
            lon.put_values(&[0.0, 1.0, 2.0], ..).unwrap();

            let mut tmp = file
                .add_variable::<f32>("TMP_2maboveground", &["time", "latitude", "longitude"])
                .unwrap();
            tmp.put_attribute("_FillValue", 9.999e20f32).unwrap();
            tmp.put_values(&[1.0f32, 2.0, 3.0, 4.0, 9.999e20, 6.0], ..)
                .unwrap();
        }

        let field = read_wgrib2_variable(&path, "TMP_2maboveground").unwrap();
        assert_eq!(field.dim_len("latitude"), Some(2));
        assert_eq!(field.latitude, vec![1.0, 0.0]);
        assert!(field.plevel.is_none());
        assert!(field.values[4].is_nan());
        assert_eq!(field.values[5], 6.0);
        assert_eq!(
            field.times,
            vec![Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()]
        );

        let missing = read_wgrib2_variable(&path, "HGT_surface").unwrap_err();
        assert!(missing.to_string().contains("TMP_2maboveground"));
    }
}
