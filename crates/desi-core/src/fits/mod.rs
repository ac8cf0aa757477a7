//! FITS access through cfitsio.
//!
//! cfitsio opens paths, so remote files are staged to local disk first (see
//! [`crate::fetch::stage_location`]). The sizes a header declares are checked
//! against the length of the file before any data is read or any buffer is
//! allocated for it; single image rows are read without touching the rest of
//! the image.

mod error;
mod table;

pub use error::FitsError;
pub use table::{Table, Value};

use std::fmt;
use std::path::Path;
use std::ptr;
use std::str::FromStr;

use fitsio::errors::check_status as fits_check_status;
use fitsio::hdu::{FitsHdu, HduInfo};

/// cfitsio datatype codes (fitsio.h).
mod datatype {
    pub const TBIT: i32 = 1;
    pub const TLOGICAL: i32 = 14;
    pub const TULONGLONG: i32 = 80;
    pub const TLONGLONG: i32 = 81;
    pub const TDOUBLE: i32 = 82;
    pub const TDBLCOMPLEX: i32 = 163;
}

/// An open FITS file.
pub struct FitsFile {
    fptr: fitsio::FitsFile,
    len: u64,
}

impl fmt::Debug for FitsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitsFile")
            .field("path", &self.fptr.file_path())
            .field("len", &self.len)
            .finish()
    }
}

/// Pixel grid of an image HDU, NAXIS1 pixels per row.
#[derive(Debug, Clone, Copy)]
struct ImageLayout {
    width: usize,
    rows: usize,
}

impl FitsFile {
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let len = std::fs::metadata(path)?.len();
        let fptr = fitsio::FitsFile::open(path).map_err(|source| FitsError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::trace!(path = %path.display(), len, "opened FITS file");
        Ok(Self { fptr, len })
    }

    /// Moves to the HDU with EXTNAME `name`.
    fn hdu(&mut self, name: &str) -> Result<FitsHdu, FitsError> {
        self.fptr.hdu(name).map_err(|e| match e {
            fitsio::errors::Error::Fits(fitsio::errors::FitsError { status: 301, .. }) => {
                FitsError::HduNotFound(name.to_string())
            }
            source => FitsError::fitsio(name, source),
        })
    }

    fn optional_key<T: FromStr>(
        &mut self,
        hdu: &FitsHdu,
        name: &str,
        keyword: &str,
    ) -> Result<Option<T>, FitsError> {
        let raw: String = match hdu.read_key(&mut self.fptr, keyword) {
            Ok(value) => value,
            Err(fitsio::errors::Error::Fits(fitsio::errors::FitsError {
                status: 202 | 204,
                ..
            })) => return Ok(None),
            Err(source) => return Err(FitsError::fitsio(name, source)),
        };
        match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(FitsError::Parse {
                hdu: name.to_string(),
                keyword: keyword.to_string(),
                value: raw,
            }),
        }
    }

    fn required_key<T: FromStr>(
        &mut self,
        hdu: &FitsHdu,
        name: &str,
        keyword: &str,
    ) -> Result<T, FitsError> {
        self.optional_key(hdu, name, keyword)?
            .ok_or_else(|| FitsError::MissingKey {
                hdu: name.to_string(),
                keyword: keyword.to_string(),
            })
    }

    /// NAXIS1..NAXISn of `hdu`, after checking that the data they describe
    /// (with PCOUNT and GCOUNT) fits in the file.
    fn checked_axes(&mut self, hdu: &FitsHdu, name: &str) -> Result<Vec<usize>, FitsError> {
        let overflow = |what| FitsError::SizeOverflow {
            hdu: name.to_string(),
            what,
        };
        let bitpix: i64 = self.required_key(hdu, name, "BITPIX")?;
        let naxis: u16 = self.required_key(hdu, name, "NAXIS")?;
        let mut axes = Vec::with_capacity(naxis as usize);
        let mut count: u64 = if naxis == 0 { 0 } else { 1 };
        for n in 1..=naxis {
            let axis: u64 = self.required_key(hdu, name, &format!("NAXIS{n}"))?;
            count = count.checked_mul(axis).ok_or_else(|| overflow("NAXISn"))?;
            axes.push(axis);
        }
        let pcount: u64 = self.optional_key(hdu, name, "PCOUNT")?.unwrap_or(0);
        let gcount: u64 = self.optional_key(hdu, name, "GCOUNT")?.unwrap_or(1);
        let needed = count
            .checked_add(pcount)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bitpix.unsigned_abs() / 8))
            .ok_or_else(|| overflow("PCOUNT/GCOUNT"))?;
        if needed > self.len {
            return Err(FitsError::DataExceedsFile {
                hdu: name.to_string(),
                needed,
                available: self.len,
            });
        }
        axes.into_iter()
            .map(|a| usize::try_from(a).map_err(|_| overflow("NAXISn")))
            .collect()
    }

    fn image(&mut self, name: &str) -> Result<(FitsHdu, ImageLayout), FitsError> {
        let hdu = self.hdu(name)?;
        if !matches!(hdu.info, HduInfo::ImageInfo { .. }) {
            return Err(FitsError::WrongHduKind {
                hdu: name.to_string(),
                expected: "image",
            });
        }
        let axes = self.checked_axes(&hdu, name)?;
        let layout = match axes.split_first() {
            Some((&width, rest)) => ImageLayout {
                width,
                rows: rest.iter().product(),
            },
            None => ImageLayout { width: 0, rows: 0 },
        };
        Ok((hdu, layout))
    }

    /// Reads a whole image HDU as `f64` with BSCALE/BZERO applied.
    pub fn read_image_f64(&mut self, name: &str) -> Result<Vec<f64>, FitsError> {
        let (hdu, _) = self.image(name)?;
        hdu.read_image(&mut self.fptr)
            .map_err(|source| FitsError::fitsio(name, source))
    }

    /// Reads row `row` (one NAXIS1-long run of pixels) of an image HDU as `f64`.
    pub fn read_image_row_f64(&mut self, name: &str, row: usize) -> Result<Vec<f64>, FitsError> {
        self.read_image_row(name, row, datatype::TDOUBLE)
    }

    /// Reads row `row` of an integer image HDU as `i64` with BZERO applied.
    pub fn read_image_row_i64(&mut self, name: &str, row: usize) -> Result<Vec<i64>, FitsError> {
        self.read_image_row(name, row, datatype::TLONGLONG)
    }

    fn read_image_row<T: Copy + Default>(
        &mut self,
        name: &str,
        row: usize,
        datatype: i32,
    ) -> Result<Vec<T>, FitsError> {
        let (_, layout) = self.image(name)?;
        if row >= layout.rows {
            return Err(FitsError::RowOutOfRange {
                row,
                rows: layout.rows,
            });
        }
        // Row and width are bounded by the checked data size.
        let first = row * layout.width + 1;
        let mut out = vec![T::default(); layout.width];
        let mut status = 0;
        unsafe {
            // ffgpv = fits_read_img
            fitsio_sys::ffgpv(
                self.fptr.as_raw(),
                datatype,
                first as i64,
                layout.width as i64,
                ptr::null_mut(),
                out.as_mut_ptr().cast(),
                ptr::null_mut(),
                &mut status,
            );
        }
        fits_check_status(status).map_err(|source| FitsError::fitsio(name, source))?;
        Ok(out)
    }

    /// Describes the columns of a binary table HDU; cells are read on demand.
    pub fn read_table(&mut self, name: &str) -> Result<Table, FitsError> {
        let hdu = self.hdu(name)?;
        self.table(hdu, name)
    }

    /// Like [`read_table`](Self::read_table), for the HDU at 0-based `index`.
    pub fn read_table_at(&mut self, index: usize) -> Result<Table, FitsError> {
        let name = format!("#{index}");
        let hdu = self.fptr.hdu(index).map_err(|e| match e {
            fitsio::errors::Error::Fits(fitsio::errors::FitsError { status: 107 | 301, .. }) => {
                FitsError::HduNotFound(name.clone())
            }
            source => FitsError::fitsio(&name, source),
        })?;
        self.table(hdu, &name)
    }

    fn table(&mut self, hdu: FitsHdu, name: &str) -> Result<Table, FitsError> {
        let column_names: Vec<String> = match &hdu.info {
            HduInfo::TableInfo {
                column_descriptions,
                ..
            } => column_descriptions.iter().map(|c| c.name.clone()).collect(),
            _ => {
                return Err(FitsError::WrongHduKind {
                    hdu: name.to_string(),
                    expected: "binary table",
                })
            }
        };
        let xtension: String = self.required_key(&hdu, name, "XTENSION")?;
        if xtension != "BINTABLE" {
            return Err(FitsError::WrongHduKind {
                hdu: name.to_string(),
                expected: "binary table",
            });
        }
        let axes = self.checked_axes(&hdu, name)?;
        let (row_len, rows) = match axes.as_slice() {
            [row_len, rows] => (*row_len, *rows),
            _ => {
                return Err(FitsError::WrongHduKind {
                    hdu: name.to_string(),
                    expected: "two-axis binary table",
                })
            }
        };

        let mut columns = Vec::with_capacity(column_names.len());
        for (i, column) in column_names.into_iter().enumerate() {
            let n = i + 1;
            let tform: String = self.required_key(&hdu, name, &format!("TFORM{n}"))?;
            let tscal: f64 = self
                .optional_key(&hdu, name, &format!("TSCAL{n}"))?
                .unwrap_or(1.0);
            let tzero: f64 = self
                .optional_key(&hdu, name, &format!("TZERO{n}"))?
                .unwrap_or(0.0);
            columns.push(table::Column::new(column, n, &tform, tscal, tzero, row_len)?);
        }
        tracing::trace!(hdu = name, rows, columns = columns.len(), "opened table");
        Ok(Table::new(name, hdu.number, rows, columns))
    }
}

#[cfg(test)]
pub(crate) mod testutil;
