//! Slicing per-object spectra and models out of an opened file.
//!
//! Spectra files carry a `FIBERMAP` table plus one image per arm and quantity
//! (`B_WAVELENGTH`, `B_FLUX`, `B_MASK`, `B_IVAR`, ... and `*_MODEL` in
//! RVSpecFit model files). Each matching FIBERMAP row selects the same row of
//! every 2-D image; the wavelength grids are shared by all rows.

mod selector;

pub use selector::TargetSelector;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fits::{FitsError, FitsFile, Table, Value};

pub const FIBERMAP_HDU: &str = "FIBERMAP";

/// Spectrograph camera arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    B,
    R,
    Z,
}

impl Arm {
    pub const ALL: [Arm; 3] = [Arm::B, Arm::R, Arm::Z];

    fn prefix(self) -> &'static str {
        match self {
            Arm::B => "B",
            Arm::R => "R",
            Arm::Z => "Z",
        }
    }

    /// HDU name of `quantity` for this arm, e.g. `B_FLUX`.
    pub fn hdu(self, quantity: &str) -> String {
        format!("{}_{}", self.prefix(), quantity)
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix().to_ascii_lowercase())
    }
}

/// Which optional products to read alongside the flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SpectraOptions {
    pub mask: bool,
    pub ivar: bool,
    pub fibermap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmSpectrum {
    pub arm: Arm,
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ivar: Option<Vec<f64>>,
}

/// One observation of the target (one FIBERMAP row).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    /// Row index in the file's FIBERMAP.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fibermap: Option<BTreeMap<String, Value>>,
    pub arms: Vec<ArmSpectrum>,
}

impl Spectrum {
    pub fn arm(&self, arm: Arm) -> Option<&ArmSpectrum> {
        self.arms.iter().find(|a| a.arm == arm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmModel {
    pub arm: Arm,
    pub wavelength: Vec<f64>,
    pub model: Vec<f64>,
}

/// Best-fit RVSpecFit model for one FIBERMAP row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpectrum {
    pub row: usize,
    pub arms: Vec<ArmModel>,
}

impl ModelSpectrum {
    pub fn arm(&self, arm: Arm) -> Option<&ArmModel> {
        self.arms.iter().find(|a| a.arm == arm)
    }
}

fn matching_rows(
    fits: &mut FitsFile,
    selector: &TargetSelector,
) -> Result<(Table, Vec<usize>), FitsError> {
    let fibermap = fits.read_table(FIBERMAP_HDU)?;
    let rows = selector.matching_rows(fits, &fibermap)?;
    if rows.is_empty() {
        tracing::warn!(?selector, "no spectra found for the given target");
    } else {
        tracing::debug!(?selector, ?rows, "matched FIBERMAP rows");
    }
    Ok((fibermap, rows))
}

fn wavelengths(fits: &mut FitsFile) -> Result<Vec<(Arm, Vec<f64>)>, FitsError> {
    Arm::ALL
        .iter()
        .map(|&arm| Ok((arm, fits.read_image_f64(&arm.hdu("WAVELENGTH"))?)))
        .collect()
}

/// Extracts every observation of the selected target from a spectra file.
///
/// An empty result (no matching row) is not an error.
pub fn read_spectra(
    fits: &mut FitsFile,
    selector: &TargetSelector,
    options: SpectraOptions,
) -> Result<Vec<Spectrum>, FitsError> {
    let (fibermap, rows) = matching_rows(fits, selector)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let waves = wavelengths(fits)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut arms = Vec::with_capacity(waves.len());
        for (arm, wavelength) in &waves {
            let arm = *arm;
            let flux = fits.read_image_row_f64(&arm.hdu("FLUX"), row)?;
            let mask = if options.mask {
                Some(fits.read_image_row_i64(&arm.hdu("MASK"), row)?)
            } else {
                None
            };
            let ivar = if options.ivar {
                Some(fits.read_image_row_f64(&arm.hdu("IVAR"), row)?)
            } else {
                None
            };
            arms.push(ArmSpectrum {
                arm,
                wavelength: wavelength.clone(),
                flux,
                mask,
                ivar,
            });
        }
        let fibermap = if options.fibermap {
            Some(fibermap.row(fits, row)?)
        } else {
            None
        };
        out.push(Spectrum {
            row,
            fibermap,
            arms,
        });
    }
    Ok(out)
}

/// Extracts the RVSpecFit models of the selected target from a model file.
pub fn read_models(
    fits: &mut FitsFile,
    selector: &TargetSelector,
) -> Result<Vec<ModelSpectrum>, FitsError> {
    let (_, rows) = matching_rows(fits, selector)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let waves = wavelengths(fits)?;

    rows.into_iter()
        .map(|row| {
            let arms = waves
                .iter()
                .map(|(arm, wavelength)| {
                    Ok(ArmModel {
                        arm: *arm,
                        wavelength: wavelength.clone(),
                        model: fits.read_image_row_f64(&arm.hdu("MODEL"), row)?,
                    })
                })
                .collect::<Result<Vec<_>, FitsError>>()?;
            Ok(ModelSpectrum { row, arms })
        })
        .collect()
}
