//! GRIB2 data unpacking algorithms.
//!
//! Simple packing (template 5.0) is decoded here. Complex packing, JPEG2000
//! and PNG are delegated to the `grib` crate, which handles them on the raw
//! message bytes.

use std::io::Cursor;

use bytes::Bytes;

use crate::{Grib2Error, Grib2Result};

/// Unpack simple packed GRIB2 data
///
/// Simple packing formula: value = (reference_value + (packed_value * 2^binary_scale)) * 10^(-decimal_scale)
///
/// The packed stream holds only the points the bitmap marks present, so the
/// bit position only advances for those. Missing points come back as NaN.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Grib2Result<Vec<f32>> {
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));
    let reference = reference_value as f64;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let bits_per_value = bits_per_value as usize;

    for i in 0..num_points {
        if let Some(bm) = bitmap {
            // 1 bit per grid point, 1 = value present
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8);
            let present = bm
                .get(byte_idx)
                .map(|byte| (byte >> bit_idx) & 1 == 1)
                .ok_or_else(|| {
                    Grib2Error::UnpackingError(format!(
                        "Bitmap too short for {} points",
                        num_points
                    ))
                })?;
            if !present {
                values.push(f32::NAN);
                continue;
            }
        }

        let packed_value = if bits_per_value == 0 {
            0
        } else {
            extract_bits(packed_data, bit_position, bits_per_value)
                .map_err(|e| Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e)))?
        };
        bit_position += bits_per_value;

        let value = (reference + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

/// Decode one field of a message with the `grib` crate.
///
/// `field_index` selects the submessage when a message repeats sections
/// 2-7 for several fields.
pub fn unpack_with_grib_crate(message: &Bytes, field_index: usize) -> Grib2Result<Vec<f32>> {
    let grib_file = grib::from_reader(Cursor::new(message.as_ref()))
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate rejected message: {}", e)))?;

    let (_index, submsg) = grib_file
        .iter()
        .nth(field_index)
        .ok_or_else(|| {
            Grib2Error::UnpackingError(format!("Field {} not found in message", field_index))
        })?;

    let decoder = grib::Grib2SubmessageDecoder::from(submsg)
        .map_err(|e| Grib2Error::UnpackingError(format!("Decoder creation failed: {}", e)))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(format!("Decoding failed: {}", e)))?;

    Ok(values.collect())
}

/// Extract bits from a byte array
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8); // MSB first

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}
