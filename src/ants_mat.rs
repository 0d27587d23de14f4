//! Functions for reading and writing ANTs affine transforms stored in MATLAB level 4 '.mat' files.
//!
//! ANTs (via ITK) writes a linear transform as two MATLAB v4 variables: the 12 transform
//! parameters (`AffineTransform_double_3_3`, 9 matrix entries followed by the translation) and
//! the 3 coordinates of the centre of rotation (`fixed`). Each variable consists of a 20 byte
//! header, the zero-terminated variable name and the values in column-major order.

use byteordered::{ByteOrdered, Endianness};

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::error::{IcvError, Result};
use crate::util::{read_fixed_length_string, read_maybe_gz};

/// Variable name of the affine parameters written by ANTs for double precision transforms.
pub const AFFINE_DOUBLE_VARIABLE: &str = "AffineTransform_double_3_3";
/// Variable name used by ITK for single precision transforms.
pub const AFFINE_FLOAT_VARIABLE: &str = "AffineTransform_float_3_3";
pub const FIXED_VARIABLE: &str = "fixed";

pub const MAT_HEADER_SIZE: usize = 20;

/// Precision codes, the 'P' digit of the MOPT type word.
pub const MAT_PRECISION_F64: i32 = 0;
pub const MAT_PRECISION_F32: i32 = 1;
pub const MAT_PRECISION_I32: i32 = 2;
pub const MAT_PRECISION_I16: i32 = 3;
pub const MAT_PRECISION_U16: i32 = 4;
pub const MAT_PRECISION_U8: i32 = 5;


/// Models the header of one variable in a MATLAB v4 file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatV4Header {
    pub mopt: i32,
    pub mrows: i32,
    pub ncols: i32,
    pub imagf: i32,
    pub namlen: i32,
    pub endianness: Endianness,
}

impl Default for MatV4Header {
    fn default() -> MatV4Header {
        MatV4Header {
            mopt: 0,
            mrows: 0,
            ncols: 0,
            imagf: 0,
            namlen: 0,
            endianness: Endianness::Little,
        }
    }
}

impl MatV4Header {

    /// Decode the endianness of a variable from the raw bytes of its type word.
    ///
    /// The 'M' digit of MOPT is 0 for little endian and 1 for big endian IEEE data, so only one of
    /// the two interpretations of the word yields a plausible type code.
    pub fn detect_endianness(type_word: [u8; 4]) -> Result<Endianness> {
        let le = i32::from_le_bytes(type_word);
        if (0..1000).contains(&le) {
            return Ok(Endianness::Little);
        }
        let be = i32::from_be_bytes(type_word);
        if (1000..2000).contains(&be) {
            return Ok(Endianness::Big);
        }
        Err(IcvError::InvalidMatFormat)
    }

    /// Read a variable header from the given byte stream.
    /// It is assumed that the input is currently at the start of the header.
    pub fn from_reader<S>(input: &mut S) -> Result<MatV4Header>
    where
        S: Read,
    {
        let mut type_word = [0u8; 4];
        input.read_exact(&mut type_word)?;
        let endianness = MatV4Header::detect_endianness(type_word)?;

        let mut hdr = MatV4Header::default();
        hdr.endianness = endianness;
        hdr.mopt = match endianness {
            Endianness::Little => i32::from_le_bytes(type_word),
            Endianness::Big => i32::from_be_bytes(type_word),
        };

        let mut input = ByteOrdered::runtime(input, endianness);
        hdr.mrows = input.read_i32()?;
        hdr.ncols = input.read_i32()?;
        hdr.imagf = input.read_i32()?;
        hdr.namlen = input.read_i32()?;

        if hdr.mrows < 0 || hdr.ncols < 0 || hdr.namlen < 1 {
            return Err(IcvError::InvalidMatFormat);
        }
        // The 'O' digit is always zero and 'T' must denote a full numeric matrix.
        if (hdr.mopt % 1000) / 100 != 0 || hdr.mopt % 10 != 0 {
            return Err(IcvError::UnsupportedMatType(hdr.mopt));
        }
        Ok(hdr)
    }

    /// The 'P' digit of MOPT.
    pub fn precision(&self) -> i32 {
        (self.mopt % 100) / 10
    }

    /// Number of values per part, `None` if `mrows * ncols` overflows.
    pub fn num_values(&self) -> Option<usize> {
        (self.mrows as usize).checked_mul(self.ncols as usize)
    }

    /// Size in bytes of one value, `None` for an unknown precision.
    pub fn element_size(&self) -> Option<usize> {
        match self.precision() {
            MAT_PRECISION_F64 => Some(8),
            MAT_PRECISION_F32 | MAT_PRECISION_I32 => Some(4),
            MAT_PRECISION_I16 | MAT_PRECISION_U16 => Some(2),
            MAT_PRECISION_U8 => Some(1),
            _ => None,
        }
    }

    /// Total size of the variable: header, name and the real (and imaginary) data.
    pub fn variable_size(&self) -> Result<usize> {
        let element_size = self.element_size().ok_or(IcvError::UnsupportedMatType(self.mopt))?;
        let parts = if self.imagf != 0 { 2 } else { 1 };
        self.num_values()
            .and_then(|n| n.checked_mul(element_size))
            .and_then(|n| n.checked_mul(parts))
            .and_then(|n| n.checked_add(MAT_HEADER_SIZE + self.namlen as usize))
            .ok_or(IcvError::InvalidMatFormat)
    }
}


/// One variable of a MATLAB v4 file. Values are converted to f64 and kept in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatVariable {
    pub header: MatV4Header,
    pub name: String,
    pub data: Vec<f64>,
}

impl MatVariable {

    /// Read a full variable (header, name and real part of the data) from the given byte stream.
    ///
    /// `available` is the number of bytes left in the input. A header claiming more than that is
    /// rejected before anything is allocated.
    pub fn from_reader<S>(input: &mut S, available: usize) -> Result<MatVariable>
    where
        S: Read,
    {
        let header = MatV4Header::from_reader(input)?;
        if header.variable_size()? > available {
            return Err(IcvError::InvalidMatFormat);
        }
        let num_values = header.num_values().ok_or(IcvError::InvalidMatFormat)?;
        let name = read_fixed_length_string(input, header.namlen as usize)?;

        let mut input = ByteOrdered::runtime(input, header.endianness);
        let parts = if header.imagf != 0 { 2 } else { 1 };
        let mut data: Vec<f64> = Vec::with_capacity(num_values);
        for part in 0..parts {
            for _ in 0..num_values {
                let value = match header.precision() {
                    MAT_PRECISION_F64 => input.read_f64()?,
                    MAT_PRECISION_F32 => input.read_f32()? as f64,
                    MAT_PRECISION_I32 => input.read_i32()? as f64,
                    MAT_PRECISION_I16 => input.read_i16()? as f64,
                    MAT_PRECISION_U16 => input.read_u16()? as f64,
                    MAT_PRECISION_U8 => input.read_u8()? as f64,
                    _ => return Err(IcvError::UnsupportedMatType(header.mopt)),
                };
                // The imaginary part is consumed but not kept.
                if part == 0 {
                    data.push(value);
                }
            }
        }

        Ok(MatVariable { header, name, data })
    }

    /// Write the variable as a little endian double precision matrix with `data.len()` rows.
    pub fn to_writer<W>(&self, output: &mut W) -> Result<()>
    where
        W: Write,
    {
        let mut output = ByteOrdered::le(output);
        output.write_i32(MAT_PRECISION_F64 * 10)?;
        output.write_i32(self.data.len() as i32)?;
        output.write_i32(1)?;
        output.write_i32(0)?;
        output.write_i32(self.name.len() as i32 + 1)?;
        output.write_all(self.name.as_bytes())?;
        output.write_u8(0)?;
        for value in self.data.iter() {
            output.write_f64(*value)?;
        }
        Ok(())
    }
}


/// Read all variables of a MATLAB v4 file from an in-memory buffer.
pub fn read_mat_variables(bytes: &[u8]) -> Result<Vec<MatVariable>> {
    let mut cursor = Cursor::new(bytes);
    let mut variables = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let available = bytes.len() - cursor.position() as usize;
        variables.push(MatVariable::from_reader(&mut cursor, available)?);
    }
    Ok(variables)
}


/// Models an affine transform file written by ANTs.
#[derive(Debug, Clone, PartialEq)]
pub struct AntsAffine {
    /// The 12 transform parameters: 3x3 matrix entries in row-major order, then the translation.
    pub parameters: Vec<f64>,
    /// The centre of rotation. Empty if the file does not contain it.
    pub fixed: Vec<f64>,
}

impl AntsAffine {

    /// Read an ANTs affine transform file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AntsAffine> {
        let bytes = read_maybe_gz(path)?;
        AntsAffine::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<AntsAffine> {
        let variables = read_mat_variables(bytes)?;

        let parameters = variables
            .iter()
            .find(|v| v.name == AFFINE_DOUBLE_VARIABLE)
            .or_else(|| variables.iter().find(|v| v.name == AFFINE_FLOAT_VARIABLE))
            .map(|v| v.data.clone())
            .ok_or_else(|| IcvError::MissingMatVariable(String::from(AFFINE_DOUBLE_VARIABLE)))?;

        let fixed = variables
            .iter()
            .find(|v| v.name == FIXED_VARIABLE)
            .map(|v| v.data.clone())
            .unwrap_or_default();

        Ok(AntsAffine { parameters, fixed })
    }

    /// Write the transform the way ANTs does: the parameters, then the fixed centre.
    pub fn to_writer<W: Write>(&self, output: &mut W) -> Result<()> {
        MatVariable {
            header: MatV4Header::default(),
            name: String::from(AFFINE_DOUBLE_VARIABLE),
            data: self.parameters.clone(),
        }
        .to_writer(output)?;
        if !self.fixed.is_empty() {
            MatVariable {
                header: MatV4Header::default(),
                name: String::from(FIXED_VARIABLE),
                data: self.fixed.clone(),
            }
            .to_writer(output)?;
        }
        Ok(())
    }
}


/// Read an ANTs affine transform from a MATLAB v4 '.mat' (or '.mat.gz') file.
///
/// # Examples
///
/// ```no_run
/// let affine = icvadjust::read_ants_affine("/path/to/sub-1_ses-T0_T1wtoUCItemplate_AffineOnly0GenericAffine.mat").unwrap();
/// assert_eq!(12, affine.parameters.len());
/// ```
pub fn read_ants_affine<P: AsRef<Path>>(path: P) -> Result<AntsAffine> {
    AntsAffine::from_file(path)
}


/// Write an ANTs affine transform to an uncompressed little endian MATLAB v4 file.
pub fn write_ants_affine<P: AsRef<Path>>(path: P, affine: &AntsAffine) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    affine.to_writer(&mut file)?;
    file.flush()?;
    Ok(())
}
