//! Thin helpers over the native netcdf library.

use std::sync::Once;

use crate::error::{NetCdfError, NetCdfResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// Call early in `main()`, before any HDF5/NetCDF operations occur. Safe to
/// call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
pub fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// String attribute, if present.
pub fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Numeric attribute widened to f64, if present.
pub fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Double(v) => Some(v),
        netcdf::AttributeValue::Float(v) => Some(v as f64),
        netcdf::AttributeValue::Int(v) => Some(v as f64),
        netcdf::AttributeValue::Short(v) => Some(v as f64),
        _ => None,
    }
}

/// Read a whole variable as f64, with its dimension names and lengths.
pub fn read_f64_variable(
    file: &netcdf::File,
    name: &str,
) -> NetCdfResult<(Vec<f64>, Vec<(String, usize)>)> {
    let var = file
        .variable(name)
        .ok_or_else(|| NetCdfError::MissingData(format!("{} variable", name)))?;
    let dims = dimensions_of(&var);
    let values: Vec<f64> = var.get_values(..)?;
    Ok((values, dims))
}

/// Dimension names and lengths of a variable, outermost first.
pub fn dimensions_of(var: &netcdf::Variable) -> Vec<(String, usize)> {
    var.dimensions()
        .iter()
        .map(|d| (d.name(), d.len()))
        .collect()
}
