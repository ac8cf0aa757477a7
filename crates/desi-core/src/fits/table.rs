//! Binary table (BINTABLE) columns.

use std::collections::BTreeMap;
use std::ptr;

use serde::Serialize;

use super::error::FitsError;
use super::{datatype, fits_check_status, FitsFile};

/// A decoded table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers that only fit unsigned (e.g. `K` columns with `TZERO = 2^63`).
    UInt(u64),
    Float(f64),
    Str(String),
    Complex(f64, f64),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Logical,
    Bits,
    Int,
    UInt,
    Float,
    Complex,
    /// `P`/`Q` variable-length array descriptors; the heap is not read.
    Descriptor,
}

#[derive(Debug, Clone)]
pub(super) struct Column {
    name: String,
    /// 1-based, as cfitsio counts.
    number: i32,
    kind: Kind,
    repeat: usize,
}

impl Column {
    pub(super) fn new(
        name: String,
        number: usize,
        tform: &str,
        tscal: f64,
        tzero: f64,
        row_len: usize,
    ) -> Result<Self, FitsError> {
        let unsupported = || FitsError::UnsupportedTform {
            column: name.clone(),
            tform: tform.to_string(),
        };
        let (repeat, code) = parse_tform(tform).ok_or_else(unsupported)?;
        let width = field_width(code, repeat).ok_or_else(unsupported)?;
        if width > row_len {
            return Err(unsupported());
        }
        let number = i32::try_from(number).map_err(|_| unsupported())?;
        let kind = match code {
            'A' => Kind::Str,
            'L' => Kind::Logical,
            'X' => Kind::Bits,
            'B' | 'I' | 'J' | 'K' if tscal != 1.0 || tzero.fract() != 0.0 => Kind::Float,
            // 2^63 is exactly representable as f64.
            'K' if tzero == 9_223_372_036_854_775_808.0 => Kind::UInt,
            'B' | 'I' | 'J' | 'K' => Kind::Int,
            'E' | 'D' => Kind::Float,
            'C' | 'M' => Kind::Complex,
            _ => Kind::Descriptor,
        };
        Ok(Self {
            name,
            number,
            kind,
            repeat,
        })
    }
}

/// One binary table HDU of a [`FitsFile`]. Cells are read through the file.
#[derive(Debug, Clone)]
pub struct Table {
    hdu: String,
    hdu_number: usize,
    rows: usize,
    columns: Vec<Column>,
}

impl Table {
    pub(super) fn new(hdu: &str, hdu_number: usize, rows: usize, columns: Vec<Column>) -> Self {
        Self {
            hdu: hdu.to_string(),
            hdu_number,
            rows,
            columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn find(&self, name: &str) -> Result<&Column, FitsError> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| FitsError::ColumnNotFound(name.to_string()))
    }

    /// All values of an integer column (first element of each cell).
    pub fn column_i64(&self, fits: &mut FitsFile, name: &str) -> Result<Vec<i64>, FitsError> {
        let col = self.find(name)?;
        let not_integer = || FitsError::NotAnIntegerColumn {
            column: col.name.clone(),
        };
        if col.repeat == 0 {
            return Err(not_integer());
        }
        // Bounded by NAXIS1 * NAXIS2, which was checked against the file size.
        let n = self.rows * col.repeat;
        match col.kind {
            Kind::Int => Ok(self
                .read_cells::<i64>(fits, col, 0, n, datatype::TLONGLONG, 1)?
                .into_iter()
                .step_by(col.repeat)
                .collect()),
            Kind::UInt => self
                .read_cells::<u64>(fits, col, 0, n, datatype::TULONGLONG, 1)?
                .into_iter()
                .step_by(col.repeat)
                .map(|u| i64::try_from(u).map_err(|_| not_integer()))
                .collect(),
            _ => Err(not_integer()),
        }
    }

    pub fn value(&self, fits: &mut FitsFile, row: usize, name: &str) -> Result<Value, FitsError> {
        self.check_row(row)?;
        let col = self.find(name)?;
        self.cell(fits, col, row)
    }

    /// Every column of row `row`, keyed by TTYPE.
    pub fn row(&self, fits: &mut FitsFile, row: usize) -> Result<BTreeMap<String, Value>, FitsError> {
        self.check_row(row)?;
        self.columns
            .iter()
            .map(|c| Ok((c.name.clone(), self.cell(fits, c, row)?)))
            .collect()
    }

    fn check_row(&self, row: usize) -> Result<(), FitsError> {
        if row >= self.rows {
            return Err(FitsError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        Ok(())
    }

    fn cell(&self, fits: &mut FitsFile, col: &Column, row: usize) -> Result<Value, FitsError> {
        let n = col.repeat;
        let items: Vec<Value> = match col.kind {
            Kind::Descriptor => return Ok(Value::Null),
            Kind::Str => {
                let hdu = self.current(fits)?;
                let s: String = hdu
                    .read_cell_value(&mut fits.fptr, col.name.as_str(), row)
                    .map_err(|source| FitsError::fitsio(&self.hdu, source))?;
                return Ok(Value::Str(s.trim_end().to_string()));
            }
            Kind::Logical => self
                .read_cells::<i8>(fits, col, row, n, datatype::TLOGICAL, 1)?
                .into_iter()
                .map(|b| Value::Bool(b != 0))
                .collect(),
            Kind::Bits => self
                .read_cells::<i8>(fits, col, row, n, datatype::TBIT, 1)?
                .into_iter()
                .map(|b| Value::Bool(b != 0))
                .collect(),
            Kind::Int => self
                .read_cells::<i64>(fits, col, row, n, datatype::TLONGLONG, 1)?
                .into_iter()
                .map(Value::Int)
                .collect(),
            Kind::UInt => self
                .read_cells::<u64>(fits, col, row, n, datatype::TULONGLONG, 1)?
                .into_iter()
                .map(|u| i64::try_from(u).map_or(Value::UInt(u), Value::Int))
                .collect(),
            Kind::Float => self
                .read_cells::<f64>(fits, col, row, n, datatype::TDOUBLE, 1)?
                .into_iter()
                .map(Value::Float)
                .collect(),
            Kind::Complex => self
                .read_cells::<f64>(fits, col, row, n, datatype::TDBLCOMPLEX, 2)?
                .chunks_exact(2)
                .map(|c| Value::Complex(c[0], c[1]))
                .collect(),
        };
        Ok(collapse(items))
    }

    /// Moves `fits` to this table's HDU.
    fn current(&self, fits: &mut FitsFile) -> Result<fitsio::hdu::FitsHdu, FitsError> {
        fits.fptr
            .hdu(self.hdu_number)
            .map_err(|source| FitsError::fitsio(&self.hdu, source))
    }

    /// Reads `nelem` elements of `col` from the start of 0-based `row` on,
    /// each converted by cfitsio to `datatype` and taking `per_elem` values of `T`.
    fn read_cells<T: Copy + Default>(
        &self,
        fits: &mut FitsFile,
        col: &Column,
        row: usize,
        nelem: usize,
        datatype: i32,
        per_elem: usize,
    ) -> Result<Vec<T>, FitsError> {
        if nelem == 0 {
            return Ok(Vec::new());
        }
        self.current(fits)?;
        let mut out = vec![T::default(); nelem * per_elem];
        let mut status = 0;
        unsafe {
            // ffgcv = fits_read_col
            fitsio_sys::ffgcv(
                fits.fptr.as_raw(),
                datatype,
                col.number,
                row as i64 + 1,
                1,
                nelem as i64,
                ptr::null_mut(),
                out.as_mut_ptr().cast(),
                &mut 0,
                &mut status,
            );
        }
        fits_check_status(status).map_err(|source| FitsError::fitsio(&self.hdu, source))?;
        Ok(out)
    }
}

/// `rTa`: repeat count (default 1), type code, optional trailing parameters.
fn parse_tform(tform: &str) -> Option<(usize, char)> {
    let tform = tform.trim();
    let digits = tform.chars().take_while(|c| c.is_ascii_digit()).count();
    let code = tform[digits..].chars().next()?;
    let repeat = if digits == 0 {
        1
    } else {
        tform[..digits].parse().ok()?
    };
    match code {
        'L' | 'X' | 'B' | 'I' | 'J' | 'K' | 'A' | 'E' | 'D' | 'C' | 'M' | 'P' | 'Q' => {
            Some((repeat, code))
        }
        _ => None,
    }
}

/// Bytes a field takes in a row.
fn field_width(code: char, repeat: usize) -> Option<usize> {
    match code {
        'X' => Some(repeat.div_ceil(8)),
        'L' | 'B' | 'A' => Some(repeat),
        'I' => repeat.checked_mul(2),
        'J' | 'E' => repeat.checked_mul(4),
        'K' | 'D' | 'C' | 'P' => repeat.checked_mul(8),
        _ => repeat.checked_mul(16),
    }
}

fn collapse(mut items: Vec<Value>) -> Value {
    match items.len() {
        0 => Value::Null,
        1 => items.pop().unwrap_or(Value::Null),
        _ => Value::Array(items),
    }
}
