//! Errors raised while reading FITS files.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("couldn't open FITS file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("no HDU named {0}")]
    HduNotFound(String),

    #[error("cfitsio failed on HDU {hdu}: {source}")]
    Fitsio {
        hdu: String,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("HDU {hdu} is not a {expected}")]
    WrongHduKind { hdu: String, expected: &'static str },

    #[error("HDU {hdu} has no keyword {keyword}")]
    MissingKey { hdu: String, keyword: String },

    #[error("HDU {hdu}: couldn't parse {keyword} = '{value}'")]
    Parse {
        hdu: String,
        keyword: String,
        value: String,
    },

    #[error("HDU {hdu}: data size from {what} overflows")]
    SizeOverflow { hdu: String, what: &'static str },

    #[error("HDU {hdu} claims {needed} bytes of data but the file holds {available}")]
    DataExceedsFile {
        hdu: String,
        needed: u64,
        available: u64,
    },

    #[error("unsupported TFORM '{tform}' for column {column}")]
    UnsupportedTform { column: String, tform: String },

    #[error("no column named {0}")]
    ColumnNotFound(String),

    #[error("column {column} does not hold integers")]
    NotAnIntegerColumn { column: String },

    #[error("row {row} out of range ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FitsError {
    pub(crate) fn fitsio(hdu: &str, source: fitsio::errors::Error) -> Self {
        FitsError::Fitsio {
            hdu: hdu.to_string(),
            source,
        }
    }
}
