//! Sequential GRIB2 message reader.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::sections::{
    parse_bitmap, parse_data_representation, parse_data_section, parse_grid_definition,
    parse_identification, parse_indicator, parse_product_definition, section_header, Bitmap,
    DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use crate::tables::Grib2Tables;
use crate::unpacking::{unpack_simple, unpack_with_grib_crate};
use crate::{Grib2Error, Grib2Result};

/// One decoded GRIB2 field.
///
/// Messages that repeat sections 3-7 yield one `Grib2Message` per field;
/// `field_index` records the position inside the enclosing message.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    pub parameter_short_name: String,
    pub level_description: String,
    /// Byte offset of the enclosing message in the source buffer.
    pub offset: usize,
    pub field_index: usize,
    raw: Bytes,
}

impl Grib2Message {
    /// Parameter short name (e.g. "TMP").
    pub fn parameter(&self) -> &str {
        &self.parameter_short_name
    }

    /// Grid dimensions as (rows, columns) = (nj, ni).
    pub fn grid_dims(&self) -> (usize, usize) {
        (
            self.grid_definition.nj as usize,
            self.grid_definition.ni as usize,
        )
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.identification.reference_time
    }

    /// Valid time of the field.
    ///
    /// For statistically processed fields (template 4.8) this is the end of
    /// the overall time interval, so a 0-6 h accumulation is valid six hours
    /// after its reference time.
    pub fn valid_time(&self) -> Grib2Result<DateTime<Utc>> {
        if let Some(stat) = &self.product_definition.statistical {
            return Ok(stat.end);
        }
        Ok(self.identification.reference_time + self.product_definition.forecast_offset()?)
    }

    /// Raw bytes of the enclosing message.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Decode the field values in file scan order. Missing points are NaN.
    pub fn unpack_data(&self) -> Grib2Result<Vec<f32>> {
        let num_points = self.grid_definition.num_points();
        let dr = &self.data_representation;

        let values = match dr.template {
            0 => {
                let bitmap = match &self.bitmap {
                    Some(bm) if bm.indicator == 0 => Some(bm.data.as_ref()),
                    Some(bm) if bm.indicator == 255 => None,
                    Some(bm) => {
                        return Err(Grib2Error::UnpackingError(format!(
                            "Unsupported bitmap indicator {}",
                            bm.indicator
                        )))
                    }
                    None => None,
                };
                unpack_simple(
                    &self.data_section.data,
                    num_points,
                    dr.bits_per_value,
                    dr.reference_value,
                    dr.binary_scale_factor,
                    dr.decimal_scale_factor,
                    bitmap,
                )?
            }
            other => {
                trace!(template = other, "Delegating unpacking to grib crate");
                unpack_with_grib_crate(&self.raw, self.field_index)?
            }
        };

        if values.len() != num_points {
            return Err(Grib2Error::UnpackingError(format!(
                "Decoded {} values for a {}-point grid",
                values.len(),
                num_points
            )));
        }
        Ok(values)
    }
}

/// Reads GRIB2 messages sequentially from an in-memory buffer.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    tables: Arc<Grib2Tables>,
    pending: VecDeque<Grib2Message>,
}

impl Grib2Reader {
    /// Reader using the NCEP parameter tables.
    pub fn new(data: Bytes) -> Self {
        Self::with_tables(data, Arc::new(Grib2Tables::ncep()))
    }

    pub fn with_tables(data: Bytes, tables: Arc<Grib2Tables>) -> Self {
        Self {
            data,
            offset: 0,
            tables,
            pending: VecDeque::new(),
        }
    }

    /// Read a whole file into memory.
    pub fn open(path: impl AsRef<Path>, tables: Arc<Grib2Tables>) -> Grib2Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = data.len(), "Loaded GRIB2 file");
        Ok(Self::with_tables(Bytes::from(data), tables))
    }

    /// Next field, or `None` at end of buffer.
    pub fn next_message(&mut self) -> Grib2Result<Option<Grib2Message>> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        let start = match find_magic(&self.data, self.offset) {
            Some(start) => start,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let indicator = parse_indicator(&self.data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "Message length {} does not fit in memory",
                indicator.message_length
            ))
        })?;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.data.len() && length >= 20)
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "Message at offset {} declares length {} beyond buffer of {} bytes",
                    start,
                    length,
                    self.data.len()
                ))
            })?;

        if &self.data[end - 4..end] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} is missing its end marker",
                start
            )));
        }

        let message = self.data.slice(start..end);
        self.offset = end;

        let fields = parse_fields(&message, indicator, start, &self.tables)?;
        self.pending.extend(fields);
        Ok(self.pending.pop_front())
    }

    /// Collect all remaining fields.
    pub fn messages(mut self) -> Grib2Result<Vec<Grib2Message>> {
        let mut out = Vec::new();
        while let Some(message) = self.next_message()? {
            out.push(message);
        }
        Ok(out)
    }
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|pos| from + pos)
}

/// Split one message into fields.
///
/// Sections 3-6 persist until replaced, so a repeated section 4/5/7 run
/// reuses the grid and bitmap defined before it.
fn parse_fields(
    message: &Bytes,
    indicator: Indicator,
    offset: usize,
    tables: &Grib2Tables,
) -> Grib2Result<Vec<Grib2Message>> {
    let mut identification = None;
    let mut grid = None;
    let mut product = None;
    let mut representation = None;
    let mut bitmap: Option<Bitmap> = None;
    let mut fields = Vec::new();

    let mut pos = 16;
    loop {
        let (length, number) = section_header(message, pos)?;
        let section = message.slice(pos..pos + length);

        match number {
            1 => identification = Some(parse_identification(&section)?),
            2 => {}
            3 => grid = Some(parse_grid_definition(&section)?),
            4 => product = Some(parse_product_definition(&section)?),
            5 => representation = Some(parse_data_representation(&section)?),
            6 => {
                let parsed = parse_bitmap(&section)?;
                // 254: reuse the previously defined bitmap
                if parsed.indicator != 254 {
                    bitmap = Some(parsed);
                } else if bitmap.is_none() {
                    return Err(Grib2Error::InvalidSection {
                        section: 6,
                        reason: "Bitmap indicator 254 without a previous bitmap".to_string(),
                    });
                }
            }
            7 => {
                let missing = |n: u8| Grib2Error::InvalidSection {
                    section: n,
                    reason: "Data section precedes required section".to_string(),
                };
                let product_definition = product.clone().ok_or_else(|| missing(4))?;
                let parameter_short_name = tables.get_parameter_name(
                    indicator.discipline,
                    product_definition.parameter_category,
                    product_definition.parameter_number,
                );
                let level_description = tables.get_level_description(
                    product_definition.level_type,
                    product_definition.level_value.round() as u32,
                );

                fields.push(Grib2Message {
                    indicator: indicator.clone(),
                    identification: identification.clone().ok_or_else(|| missing(1))?,
                    grid_definition: grid.clone().ok_or_else(|| missing(3))?,
                    product_definition,
                    data_representation: representation.clone().ok_or_else(|| missing(5))?,
                    bitmap: bitmap.clone(),
                    data_section: parse_data_section(&section)?,
                    parameter_short_name,
                    level_description,
                    offset,
                    field_index: fields.len(),
                    raw: message.clone(),
                });
            }
            8 => break,
            other => {
                return Err(Grib2Error::InvalidFormat(format!(
                    "Unexpected section number {} at offset {}",
                    other,
                    offset + pos
                )))
            }
        }

        pos += length;
    }

    if fields.is_empty() {
        return Err(Grib2Error::InvalidFormat(format!(
            "Message at offset {} contains no data section",
            offset
        )));
    }
    Ok(fields)
}
