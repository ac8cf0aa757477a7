//! Gaia EDR3 source-id lookup.
//!
//! Releases publish an index from Gaia source ids to the HEALPix coadd that
//! holds each object. Two layouts exist:
//!
//! - a FITS binary table (`EDR3_SOURCE_ID`, `TARGETID`, `survey`,
//!   `subsurvey`, `hpx`) sorted by source id;
//! - a parquet key file (`EDR3_SOURCE_ID`, `pos1`, `pos2`) sorted by source
//!   id, plus a row file whose first 1000 bytes are a pickled list of field
//!   names and whose record `i` is a pickled tuple at bytes `pos1..pos2`.
//!
//! Ids can repeat; the first entry wins.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, Value as Pickled};
use thiserror::Error;

use crate::archive_path::{ArchiveRoot, Locator, Location};
use crate::extract::TargetSelector;
use crate::fits::{FitsError, FitsFile, Value};

/// Bytes of pickled field names at the start of a row file.
pub const ROW_HEADER_LEN: u64 = 1000;

/// Upper bound on one pickled record; real records are well under 1 KiB.
const MAX_RECORD_LEN: u64 = 1 << 20;

/// Where a release keeps its index files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDir {
    /// Directory relative to the archive root.
    Archive(&'static str),
    /// Absolute base URL outside the archive.
    Url(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    FitsTable { file: &'static str },
    Pickled { keys: &'static str, rows: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaiaIndexSource {
    pub dir: IndexDir,
    pub format: IndexFormat,
}

impl GaiaIndexSource {
    /// Location of one of the index files. `override_root`, when given,
    /// holds all index files directly and replaces the release's directory.
    pub fn location(
        &self,
        file: &str,
        archive: &ArchiveRoot,
        override_root: Option<&ArchiveRoot>,
    ) -> Result<Location, url::ParseError> {
        if let Some(root) = override_root {
            return root.resolve(file);
        }
        match self.dir {
            IndexDir::Archive(dir) => archive.resolve(&format!("{dir}/{file}")),
            IndexDir::Url(base) => base.parse::<ArchiveRoot>()?.resolve(file),
        }
    }
}

/// The coadd holding a Gaia source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GaiaMatch {
    pub source_id: i64,
    pub target_id: i64,
    pub survey: String,
    pub program: String,
    pub healpix: u32,
}

impl GaiaMatch {
    pub fn locator(&self) -> Locator {
        Locator::Healpix {
            survey: self.survey.clone(),
            program: self.program.clone(),
            healpix: self.healpix,
        }
    }

    pub fn selector(&self) -> TargetSelector {
        TargetSelector::target(self.target_id)
    }
}

#[derive(Error, Debug)]
pub enum GaiaIndexError {
    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("reading parquet key file: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("decoding pickled record: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[error("index column {column}: {reason}")]
    BadColumn { column: String, reason: String },

    #[error("record span {start}..{end} is invalid")]
    BadSpan { start: i64, end: i64 },

    #[error("record has no usable {0}")]
    BadField(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// First index of `id` in the sorted `ids`.
fn search_sorted(ids: &[i64], id: i64) -> Option<usize> {
    let i = ids.partition_point(|&x| x < id);
    (ids.get(i) == Some(&id)).then_some(i)
}

/// Looks `source_id` up in a FITS table index (first extension).
pub fn lookup_fits_table(
    fits: &mut FitsFile,
    source_id: i64,
) -> Result<Option<GaiaMatch>, GaiaIndexError> {
    let table = fits.read_table_at(1)?;
    let ids = table.column_i64(fits, "EDR3_SOURCE_ID")?;
    let Some(row) = search_sorted(&ids, source_id) else {
        return Ok(None);
    };
    let int = |value: Value, column: &str| {
        value
            .as_i64()
            .ok_or_else(|| GaiaIndexError::BadField(column.to_string()))
    };
    let text = |value: Value, column: &str| match value {
        Value::Str(s) => Ok(s.trim().to_string()),
        _ => Err(GaiaIndexError::BadField(column.to_string())),
    };
    let healpix = int(table.value(fits, row, "hpx")?, "hpx")?;
    Ok(Some(GaiaMatch {
        source_id,
        target_id: int(table.value(fits, row, "TARGETID")?, "TARGETID")?,
        survey: text(table.value(fits, row, "survey")?, "survey")?,
        program: text(table.value(fits, row, "subsurvey")?, "subsurvey")?,
        healpix: u32::try_from(healpix).map_err(|_| GaiaIndexError::BadField("hpx".into()))?,
    }))
}

/// Sorted source ids and the byte span of each one's record in the row file.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    ids: Vec<i64>,
    spans: Vec<(i64, i64)>,
}

impl KeyIndex {
    pub fn read_parquet(file: File) -> Result<Self, GaiaIndexError> {
        let reader = SerializedFileReader::new(file)?;
        let mut index = KeyIndex::default();
        for row in reader.get_row_iter(None)? {
            let row = row?;
            let (mut id, mut pos1, mut pos2) = (None, None, None);
            for (name, field) in row.get_column_iter() {
                let value = match field {
                    Field::Long(v) => Some(*v),
                    Field::Int(v) => Some(i64::from(*v)),
                    Field::UInt(v) => Some(i64::from(*v)),
                    Field::ULong(v) => i64::try_from(*v).ok(),
                    _ => None,
                };
                match name.as_str() {
                    "EDR3_SOURCE_ID" => id = value,
                    "pos1" => pos1 = value,
                    "pos2" => pos2 = value,
                    _ => {}
                }
            }
            let missing = |column: &str| GaiaIndexError::BadColumn {
                column: column.to_string(),
                reason: format!("no integer value in row {}", index.ids.len()),
            };
            let id = id.ok_or_else(|| missing("EDR3_SOURCE_ID"))?;
            let span = (
                pos1.ok_or_else(|| missing("pos1"))?,
                pos2.ok_or_else(|| missing("pos2"))?,
            );
            if index.ids.last().is_some_and(|&last| last > id) {
                return Err(GaiaIndexError::BadColumn {
                    column: "EDR3_SOURCE_ID".into(),
                    reason: "not sorted".into(),
                });
            }
            index.ids.push(id);
            index.spans.push(span);
        }
        tracing::debug!(entries = index.ids.len(), "read Gaia key index");
        Ok(index)
    }

    /// Byte span of the record for `source_id`.
    pub fn find(&self, source_id: i64) -> Option<(i64, i64)> {
        search_sorted(&self.ids, source_id).map(|i| self.spans[i])
    }
}

/// Field names pickled at the start of a row file.
pub fn read_row_fields<R: Read + Seek>(rows: &mut R) -> Result<Vec<String>, GaiaIndexError> {
    rows.seek(SeekFrom::Start(0))?;
    let mut header = Vec::new();
    rows.by_ref().take(ROW_HEADER_LEN).read_to_end(&mut header)?;
    // The pickle stops before the end of the padded header.
    let mut de = serde_pickle::Deserializer::new(header.as_slice(), DeOptions::new());
    Ok(Vec::<String>::deserialize(&mut de)?)
}

/// Decodes the record at `span` into a match for `source_id`.
pub fn read_record<R: Read + Seek>(
    rows: &mut R,
    fields: &[String],
    span: (i64, i64),
    source_id: i64,
) -> Result<GaiaMatch, GaiaIndexError> {
    let (start, end) = span;
    let bad_span = || GaiaIndexError::BadSpan { start, end };
    let first = u64::try_from(start).map_err(|_| bad_span())?;
    let len = end
        .checked_sub(start)
        .and_then(|n| u64::try_from(n).ok())
        .filter(|&n| n > 0 && n <= MAX_RECORD_LEN)
        .ok_or_else(bad_span)?;
    rows.seek(SeekFrom::Start(first))?;
    let mut buf = vec![0u8; len as usize];
    rows.read_exact(&mut buf)?;

    let values = match serde_pickle::value_from_slice(&buf, DeOptions::new())? {
        Pickled::Tuple(v) | Pickled::List(v) => v,
        _ => return Err(GaiaIndexError::BadField("record tuple".into())),
    };
    let field = |name: &str| {
        fields
            .iter()
            .position(|f| f == name)
            .and_then(|i| values.get(i))
            .ok_or_else(|| GaiaIndexError::BadField(name.to_string()))
    };
    let int = |name: &str| -> Result<i64, GaiaIndexError> {
        match field(name)? {
            Pickled::I64(v) => Ok(*v),
            _ => Err(GaiaIndexError::BadField(name.to_string())),
        }
    };
    let text = |name: &str| -> Result<String, GaiaIndexError> {
        match field(name)? {
            Pickled::String(s) => Ok(s.trim().to_string()),
            Pickled::Bytes(b) => Ok(String::from_utf8_lossy(b).trim().to_string()),
            _ => Err(GaiaIndexError::BadField(name.to_string())),
        }
    };
    Ok(GaiaMatch {
        source_id,
        target_id: int("TARGETID")?,
        survey: text("SURVEY")?,
        program: text("PROGRAM")?,
        healpix: u32::try_from(int("hpx")?)
            .map_err(|_| GaiaIndexError::BadField("hpx".into()))?,
    })
}
