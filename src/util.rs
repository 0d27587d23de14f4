//! Utility functions used in all other icvadjust modules.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;

use crate::error::{IcvError, Result};

use byteordered::byteorder::ReadBytesExt;

/// Prefix of subject directory names and of subject IDs in determinant tables.
pub const SUBJECT_PREFIX: &str = "sub-";

/// Check whether the file extension ends with ".gz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}


/// Read the whole file into memory, gunzipping it if the name ends with ".gz".
///
/// A file that does not exist is reported as [`IcvError::MissingInput`], so that batch code can
/// tell an absent input apart from other I/O failures.
pub fn read_maybe_gz<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IcvError::MissingInput(path.to_path_buf()));
    }
    let file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if is_gz_file(path) {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        let mut file = file;
        file.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}


/// Read a fixed length zero-terminated byte string of the given length from the input. Embedded '\0' chars are allowed, but not added to the returned String.
pub fn read_fixed_length_string<S>(input: &mut S, len: usize) -> Result<String>
where
    S: Read,
{
    let mut name = String::with_capacity(len);
    for _ in 0..len {
        let cur_char = input.read_u8()? as char;
        if cur_char != '\0' {
            name.push(cur_char);
        }
    }
    Ok(name)
}


/// Round to the given number of decimal places.
///
/// The exact binary value is rounded, so `1.0005` (stored slightly below) becomes `1.0`.
pub fn round_decimals(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}


/// Strip the `sub-` prefix from a subject directory name, if present.
pub fn strip_subject_prefix(id: &str) -> &str {
    id.strip_prefix(SUBJECT_PREFIX).unwrap_or(id)
}


/// Parse a table cell into a value. Empty cells and NaN are missing values.
pub fn parse_optional_f64(cell: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    let value: f64 = cell.parse()?;
    if value.is_nan() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}


/// Format a value for a table cell. Missing values become empty cells.
pub fn format_optional_f64(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
