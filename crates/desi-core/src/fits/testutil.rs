//! Assembles small FITS files byte by byte for tests, including headers a
//! well-behaved writer would never produce.
//!
//! Only uses external crates so integration tests can include it with `#[path]`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};

const BLOCK: usize = 2880;

pub struct TableColumn {
    name: String,
    tform: String,
    tzero: Option<String>,
    cells: Vec<Vec<u8>>,
}

impl TableColumn {
    pub fn i64(name: &str, values: Vec<i64>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| {
                let mut b = Vec::new();
                b.write_i64::<BigEndian>(v).unwrap();
                b
            })
            .collect();
        Self::new(name, "K", None, cells)
    }

    /// Unsigned 64-bit column using the `TZERO = 2^63` convention.
    pub fn u64(name: &str, values: Vec<u64>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| {
                let mut b = Vec::new();
                b.write_i64::<BigEndian>((v ^ (1u64 << 63)) as i64).unwrap();
                b
            })
            .collect();
        Self::new(name, "K", Some("9223372036854775808"), cells)
    }

    pub fn i32(name: &str, values: Vec<i32>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| {
                let mut b = Vec::new();
                b.write_i32::<BigEndian>(v).unwrap();
                b
            })
            .collect();
        Self::new(name, "J", None, cells)
    }

    pub fn f64(name: &str, values: Vec<f64>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| {
                let mut b = Vec::new();
                b.write_f64::<BigEndian>(v).unwrap();
                b
            })
            .collect();
        Self::new(name, "D", None, cells)
    }

    pub fn f32_array(name: &str, repeat: usize, values: Vec<Vec<f32>>) -> Self {
        let cells = values
            .into_iter()
            .map(|row| {
                assert_eq!(row.len(), repeat);
                let mut b = Vec::new();
                for v in row {
                    b.write_f32::<BigEndian>(v).unwrap();
                }
                b
            })
            .collect();
        Self::new(name, &format!("{}E", repeat), None, cells)
    }

    pub fn string(name: &str, width: usize, values: Vec<&str>) -> Self {
        let cells = values
            .into_iter()
            .map(|s| {
                let mut b = s.as_bytes().to_vec();
                b.resize(width, b' ');
                b
            })
            .collect();
        Self::new(name, &format!("{}A", width), None, cells)
    }

    pub fn logical(name: &str, values: Vec<bool>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| vec![if v { b'T' } else { b'F' }])
            .collect();
        Self::new(name, "L", None, cells)
    }

    fn new(name: &str, tform: &str, tzero: Option<&str>, cells: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            tform: tform.to_string(),
            tzero: tzero.map(str::to_string),
            cells,
        }
    }
}

pub struct FitsBuilder {
    bytes: Vec<u8>,
}

impl Default for FitsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitsBuilder {
    /// Starts a file with an empty primary HDU.
    pub fn new() -> Self {
        Self::with_primary_cards(&[])
    }

    /// Empty primary HDU carrying `extra` cards (each a full card image).
    pub fn with_primary_cards(extra: &[String]) -> Self {
        let mut cards = vec![
            card("SIMPLE", "T"),
            card("BITPIX", "8"),
            card("NAXIS", "0"),
            card("EXTEND", "T"),
        ];
        cards.extend_from_slice(extra);
        let mut bytes = Vec::new();
        push_header(&mut bytes, &cards);
        Self { bytes }
    }

    /// Appends an HDU assembled with [`raw_hdu`].
    pub fn raw(mut self, hdu: Vec<u8>) -> Self {
        self.bytes.extend_from_slice(&hdu);
        self
    }

    pub fn image_f32(self, name: &str, shape: &[usize], data: &[f32]) -> Self {
        let mut raw = Vec::new();
        for v in data {
            raw.write_f32::<BigEndian>(*v).unwrap();
        }
        self.image(name, -32, shape, &[], raw, data.len())
    }

    pub fn image_f64(self, name: &str, shape: &[usize], data: &[f64]) -> Self {
        let mut raw = Vec::new();
        for v in data {
            raw.write_f64::<BigEndian>(*v).unwrap();
        }
        self.image(name, -64, shape, &[], raw, data.len())
    }

    /// Unsigned 32-bit image stored as BITPIX 32 with `BZERO = 2^31`.
    pub fn image_u32(self, name: &str, shape: &[usize], data: &[u32]) -> Self {
        let mut raw = Vec::new();
        for v in data {
            raw.write_i32::<BigEndian>((*v ^ (1u32 << 31)) as i32).unwrap();
        }
        let extra = [card("BZERO", "2147483648"), card("BSCALE", "1")];
        self.image(name, 32, shape, &extra, raw, data.len())
    }

    fn image(
        mut self,
        name: &str,
        bitpix: i32,
        shape: &[usize],
        extra: &[String],
        raw: Vec<u8>,
        count: usize,
    ) -> Self {
        assert_eq!(shape.iter().product::<usize>(), count);
        let mut cards = vec![
            card_str("XTENSION", "IMAGE"),
            card("BITPIX", &bitpix.to_string()),
            card("NAXIS", &shape.len().to_string()),
        ];
        for (i, n) in shape.iter().enumerate() {
            cards.push(card(&format!("NAXIS{}", i + 1), &n.to_string()));
        }
        cards.push(card("PCOUNT", "0"));
        cards.push(card("GCOUNT", "1"));
        cards.extend_from_slice(extra);
        cards.push(card_str("EXTNAME", name));
        push_header(&mut self.bytes, &cards);
        push_data(&mut self.bytes, raw);
        self
    }

    pub fn table(mut self, name: &str, columns: Vec<TableColumn>) -> Self {
        let rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        let row_len: usize = columns
            .iter()
            .map(|c| c.cells.first().map(Vec::len).unwrap_or(0))
            .sum();
        let mut cards = vec![
            card_str("XTENSION", "BINTABLE"),
            card("BITPIX", "8"),
            card("NAXIS", "2"),
            card("NAXIS1", &row_len.to_string()),
            card("NAXIS2", &rows.to_string()),
            card("PCOUNT", "0"),
            card("GCOUNT", "1"),
            card("TFIELDS", &columns.len().to_string()),
        ];
        for (i, c) in columns.iter().enumerate() {
            cards.push(card_str(&format!("TTYPE{}", i + 1), &c.name));
            cards.push(card_str(&format!("TFORM{}", i + 1), &c.tform));
            if let Some(z) = &c.tzero {
                cards.push(card(&format!("TZERO{}", i + 1), z));
            }
        }
        cards.push(card_str("EXTNAME", name));
        push_header(&mut self.bytes, &cards);

        let mut raw = Vec::with_capacity(rows * row_len);
        for r in 0..rows {
            for c in &columns {
                raw.extend_from_slice(&c.cells[r]);
            }
        }
        push_data(&mut self.bytes, raw);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// A fixed-format card; quoted values start in column 11, others end in column 30.
pub fn card(key: &str, value: &str) -> String {
    if value.starts_with('\'') {
        format!("{:<8}= {}", key, value)
    } else {
        format!("{:<8}= {:>20}", key, value)
    }
}

fn card_str(key: &str, value: &str) -> String {
    format!("{:<8}= '{:<8}'", key, value.replace('\'', "''"))
}

/// One header (the given cards plus END) and its data, both padded to records.
pub fn raw_hdu(cards: &[String], data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    push_header(&mut bytes, cards);
    push_data(&mut bytes, data.to_vec());
    bytes
}

/// A FITS file on disk, removed on drop.
pub struct Fixture {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn save(bytes: &[u8]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.fits");
    std::fs::write(&path, bytes).unwrap();
    Fixture { _dir: dir, path }
}

fn push_header(bytes: &mut Vec<u8>, cards: &[String]) {
    let mut text = String::new();
    for c in cards {
        text.push_str(&format!("{:<80}", c));
    }
    text.push_str(&format!("{:<80}", "END"));
    let mut block = text.into_bytes();
    let padded = block.len().div_ceil(BLOCK) * BLOCK;
    block.resize(padded, b' ');
    bytes.extend_from_slice(&block);
}

fn push_data(bytes: &mut Vec<u8>, mut raw: Vec<u8>) {
    let padded = raw.len().div_ceil(BLOCK) * BLOCK;
    raw.resize(padded, 0);
    bytes.extend_from_slice(&raw);
}
