#![allow(dead_code)]

pub mod archive_server;
#[path = "../../src/fits/testutil.rs"]
pub mod fits_builder;

use fits_builder::{FitsBuilder, TableColumn};

pub const TARGET_A: i64 = 39627652591521181;
pub const TARGET_B: i64 = 39627652591521999;
pub const PIXELS: usize = 2000;
pub const ROWS: usize = 20;

/// A coadd-like file of `ROWS` fibers starting at 1010; TARGET_A and
/// TARGET_B sit in rows 0 and 1. Each arm is `PIXELS` wide and the flux of
/// row r, pixel i is `r * 10000 + i`.
pub fn spectra_file(with_models: bool) -> Vec<u8> {
    let target_ids: Vec<i64> = (0..ROWS as i64)
        .map(|r| match r {
            0 => TARGET_A,
            1 => TARGET_B,
            _ => 1000 + r,
        })
        .collect();
    let mut b = FitsBuilder::new().table(
        "FIBERMAP",
        vec![
            TableColumn::i64("TARGETID", target_ids),
            TableColumn::i32("FIBER", (0..ROWS as i32).map(|r| 1010 + r).collect()),
            TableColumn::i32("EXPID", vec![120001; ROWS]),
            TableColumn::string("OBJTYPE", 3, vec!["TGT"; ROWS]),
        ],
    );
    let n = ROWS * PIXELS;
    for (a, arm) in ["B", "R", "Z"].iter().enumerate() {
        let start = 3600.0 + 2000.0 * a as f64;
        let wave: Vec<f64> = (0..PIXELS).map(|i| start + 0.8 * i as f64).collect();
        let flux: Vec<f32> = (0..n)
            .map(|k| ((k / PIXELS) * 10000 + k % PIXELS) as f32)
            .collect();
        b = b
            .image_f64(&format!("{arm}_WAVELENGTH"), &[PIXELS], &wave)
            .image_f32(&format!("{arm}_FLUX"), &[PIXELS, ROWS], &flux)
            .image_f32(&format!("{arm}_IVAR"), &[PIXELS, ROWS], &vec![4.0; n])
            .image_u32(&format!("{arm}_MASK"), &[PIXELS, ROWS], &vec![0; n]);
        if with_models {
            b = b.image_f32(&format!("{arm}_MODEL"), &[PIXELS, ROWS], &vec![1.5; n]);
        }
    }
    b.build()
}
