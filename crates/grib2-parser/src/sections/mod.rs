//! GRIB2 section parsing.
//!
//! Each GRIB2 message is a sequence of length-prefixed sections. The parse
//! functions here take the bytes of a single section, starting at its
//! 4-byte length field, and decode the fields the pipeline needs.
//!
//! Signed quantities in GRIB2 are sign-magnitude encoded: the most
//! significant bit carries the sign, the remaining bits the magnitude.

use crate::{Grib2Error, Grib2Result};
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section (template 3.0, regular lat/lon)
///
/// Angles are stored in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDefinition {
    pub template: u16,
    pub num_data_points: u32,
    pub grid_shape: u8,
    pub ni: u32,
    pub nj: u32,
    pub first_latitude: f64,
    pub first_longitude: f64,
    pub last_latitude: f64,
    pub last_longitude: f64,
    pub i_increment: Option<f64>,
    pub j_increment: Option<f64>,
    pub scanning_mode: u8,
}

/// Scanning mode flag: points scan in the -i direction (east to west).
pub const SCAN_NEGATIVE_I: u8 = 0x80;
/// Scanning mode flag: points scan in the +j direction (south to north).
pub const SCAN_POSITIVE_J: u8 = 0x40;
/// Scanning mode flag: adjacent points are consecutive in j, not i.
pub const SCAN_J_CONSECUTIVE: u8 = 0x20;
/// Scanning mode flag: rows alternate direction.
pub const SCAN_BOUSTROPHEDON: u8 = 0x10;

impl GridDefinition {
    pub fn num_points(&self) -> usize {
        self.ni as usize * self.nj as usize
    }

    /// Latitudes in file row order.
    pub fn latitudes(&self) -> Vec<f64> {
        let nj = self.nj as usize;
        let step = self.j_increment.unwrap_or_else(|| {
            if nj > 1 {
                (self.last_latitude - self.first_latitude).abs() / (nj - 1) as f64
            } else {
                0.0
            }
        });
        let sign = if self.scanning_mode & SCAN_POSITIVE_J != 0 {
            1.0
        } else {
            -1.0
        };
        (0..nj)
            .map(|j| self.first_latitude + sign * step * j as f64)
            .collect()
    }

    /// Longitudes in file column order, normalized to [0, 360).
    pub fn longitudes(&self) -> Vec<f64> {
        let ni = self.ni as usize;
        let step = self.i_increment.unwrap_or_else(|| {
            if ni > 1 {
                (self.last_longitude - self.first_longitude).rem_euclid(360.0) / (ni - 1) as f64
            } else {
                0.0
            }
        });
        let sign = if self.scanning_mode & SCAN_NEGATIVE_I != 0 {
            -1.0
        } else {
            1.0
        };
        (0..ni)
            .map(|i| (self.first_longitude + sign * step * i as f64).rem_euclid(360.0))
            .collect()
    }
}

/// Statistical processing descriptor from product template 4.8.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalInterval {
    /// End of the overall time interval.
    pub end: DateTime<Utc>,
    /// Statistical process (code table 4.10): 0 average, 1 accumulation, ...
    pub process: u8,
    /// Length of the processed time range.
    pub length: Duration,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub forecast_time_unit: u8,
    pub forecast_time: i64,
    pub level_type: u8,
    /// First fixed surface in SI units (Pa for isobaric, m for heights).
    pub level_value: f64,
    pub statistical: Option<StatisticalInterval>,
}

impl ProductDefinition {
    /// Forecast offset from the reference time.
    pub fn forecast_offset(&self) -> Grib2Result<Duration> {
        time_range(self.forecast_time_unit, self.forecast_time)
    }
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Grib2Result<Indicator> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = u64::from_be_bytes(be_array(&data[8..16]));

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Read the (length, number) header of the section starting at `offset`.
pub fn section_header(data: &[u8], offset: usize) -> Grib2Result<(usize, u8)> {
    if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
        return Ok((4, 8));
    }
    if offset + 5 > data.len() {
        return Err(Grib2Error::InvalidFormat(format!(
            "Truncated section header at offset {}",
            offset
        )));
    }
    let length = read_u32(data, offset) as usize;
    let number = data[offset + 4];
    if length < 5 || offset + length > data.len() {
        return Err(Grib2Error::InvalidSection {
            section: number,
            reason: format!("Invalid section length {} at offset {}", length, offset),
        });
    }
    Ok((length, number))
}

/// Parse Section 1 (Identification)
pub fn parse_identification(section: &[u8]) -> Grib2Result<Identification> {
    require_len(section, 1, 21)?;

    let year = read_u16(section, 12);
    let (month, day, hour, minute, second) =
        (section[14], section[15], section[16], section[17], section[18]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center: read_u16(section, 5),
        sub_center: read_u16(section, 7),
        table_version: section[9],
        local_table_version: section[10],
        significance_of_reference_time: section[11],
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: section[19],
        data_type: section[20],
    })
}

/// Parse Section 3 (Grid Definition)
///
/// Only template 3.0 (regular latitude/longitude) is supported; GDAS 0.25°
/// products use nothing else.
pub fn parse_grid_definition(section: &[u8]) -> Grib2Result<GridDefinition> {
    require_len(section, 3, 14)?;

    let num_data_points = read_u32(section, 6);
    let template = read_u16(section, 12);
    if template != 0 {
        return Err(Grib2Error::UnsupportedTemplate {
            what: "grid definition",
            template,
        });
    }
    require_len(section, 3, 72)?;

    let ni = read_u32(section, 30);
    let nj = read_u32(section, 34);

    // Angles are in 1e-6 degrees unless a basic angle is given.
    let basic_angle = read_u32(section, 38);
    let subdivisions = read_u32(section, 42);
    let unit = if basic_angle == 0 || basic_angle == u32::MAX || subdivisions == 0 || subdivisions == u32::MAX {
        1e-6
    } else {
        basic_angle as f64 / subdivisions as f64
    };

    let resolution_flags = section[54];
    let di = read_u32(section, 63);
    let dj = read_u32(section, 67);
    let scanning_mode = section[71];

    if scanning_mode & (SCAN_J_CONSECUTIVE | SCAN_BOUSTROPHEDON) != 0 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Unsupported scanning mode {:#04x}", scanning_mode),
        });
    }

    let increment = |flag: u8, raw: u32| {
        (resolution_flags & flag != 0 && raw != u32::MAX).then(|| raw as f64 * unit)
    };

    Ok(GridDefinition {
        template,
        num_data_points,
        grid_shape: section[14],
        ni,
        nj,
        first_latitude: read_signed_u32(section, 46) as f64 * unit,
        first_longitude: read_signed_u32(section, 50) as f64 * unit,
        last_latitude: read_signed_u32(section, 55) as f64 * unit,
        last_longitude: read_signed_u32(section, 59) as f64 * unit,
        i_increment: increment(0x20, di),
        j_increment: increment(0x10, dj),
        scanning_mode,
    })
}

/// Parse Section 4 (Product Definition)
///
/// Templates 4.0 through 4.15 share the layout of the first 34 octets, so
/// parameter, forecast time and first fixed surface are read for any of
/// them. Template 4.8 additionally yields the statistical interval.
pub fn parse_product_definition(section: &[u8]) -> Grib2Result<ProductDefinition> {
    require_len(section, 4, 9)?;
    let template = read_u16(section, 7);
    if template > 15 {
        return Err(Grib2Error::UnsupportedTemplate {
            what: "product definition",
            template,
        });
    }
    require_len(section, 4, 34)?;

    let scale_factor = read_signed_u8(section[23]);
    let scaled_value = read_u32(section, 24);
    let level_value = if scaled_value == u32::MAX {
        0.0
    } else {
        scaled_value as f64 * 10f64.powi(-(scale_factor as i32))
    };

    let statistical = if template == 8 {
        Some(parse_statistical_interval(section)?)
    } else {
        None
    };

    Ok(ProductDefinition {
        template,
        parameter_category: section[9],
        parameter_number: section[10],
        forecast_time_unit: section[17],
        forecast_time: read_signed_u32(section, 18) as i64,
        level_type: section[22],
        level_value,
        statistical,
    })
}

fn parse_statistical_interval(section: &[u8]) -> Grib2Result<StatisticalInterval> {
    require_len(section, 4, 58)?;

    let year = read_u16(section, 34);
    let end = NaiveDate::from_ymd_opt(year as i32, section[36] as u32, section[37] as u32)
        .and_then(|d| d.and_hms_opt(section[38] as u32, section[39] as u32, section[40] as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 4,
            reason: format!("Invalid end of overall time interval (year {})", year),
        })?;

    let length = time_range(section[48], read_u32(section, 49) as i64)?;

    Ok(StatisticalInterval {
        end: DateTime::<Utc>::from_naive_utc_and_offset(end, Utc),
        process: section[46],
        length,
    })
}

/// Parse Section 5 (Data Representation)
///
/// Templates 5.0, 5.2, 5.3, 5.40 and 5.41 all start with the simple
/// packing parameters.
pub fn parse_data_representation(section: &[u8]) -> Grib2Result<DataRepresentation> {
    require_len(section, 5, 21)?;

    Ok(DataRepresentation {
        num_data_points: read_u32(section, 5),
        template: read_u16(section, 9),
        reference_value: f32::from_be_bytes(be_array(&section[11..15])),
        binary_scale_factor: read_signed_u16(section, 15),
        decimal_scale_factor: read_signed_u16(section, 17),
        bits_per_value: section[19],
        original_data_type: section[20],
    })
}

/// Parse Section 6 (Bitmap). `section` is a slice of the message buffer.
pub fn parse_bitmap(section: &Bytes) -> Grib2Result<Bitmap> {
    require_len(section, 6, 6)?;
    Ok(Bitmap {
        indicator: section[5],
        data: section.slice(6..),
    })
}

/// Parse Section 7 (Data). `section` is a slice of the message buffer.
pub fn parse_data_section(section: &Bytes) -> Grib2Result<DataSection> {
    require_len(section, 7, 5)?;
    Ok(DataSection {
        data: section.slice(5..),
    })
}

// ===== Helper Functions =====

/// Convert a time range in code table 4.4 units into a duration.
pub fn time_range(unit: u8, value: i64) -> Grib2Result<Duration> {
    let duration = match unit {
        0 => Duration::minutes(value),
        1 => Duration::hours(value),
        2 => Duration::days(value),
        10 => Duration::hours(3 * value),
        11 => Duration::hours(6 * value),
        12 => Duration::hours(12 * value),
        13 => Duration::seconds(value),
        other => {
            return Err(Grib2Error::InvalidSection {
                section: 4,
                reason: format!("Unsupported time range unit {}", other),
            })
        }
    };
    Ok(duration)
}

fn require_len(section: &[u8], number: u8, needed: usize) -> Grib2Result<()> {
    if section.len() < needed {
        return Err(Grib2Error::InvalidSection {
            section: number,
            reason: format!("Need {} bytes, got {}", needed, section.len()),
        });
    }
    Ok(())
}

fn be_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes(be_array(&data[offset..offset + 2]))
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(be_array(&data[offset..offset + 4]))
}

fn read_signed_u8(raw: u8) -> i8 {
    let magnitude = (raw & 0x7F) as i8;
    if raw & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_signed_u16(data: &[u8], offset: usize) -> i16 {
    let raw = read_u16(data, offset);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_signed_u32(data: &[u8], offset: usize) -> i32 {
    let raw = read_u32(data, offset);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}
