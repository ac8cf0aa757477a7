//! Archive path construction.
//!
//! Maps identifying parameters (HEALPix pixel or tile/night/spectrograph) to
//! the path of the spectra or RVSpecFit model file below the archive root.

mod root;

pub use root::{ArchiveRoot, Location, DEFAULT_ARCHIVE_ROOT};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::{Layout, Release};

/// Number of fibers per spectrograph.
pub const FIBERS_PER_SPECTROGRAPH: u32 = 500;

/// Spectrograph (petal) holding `fiber`.
pub fn spectrograph_for_fiber(fiber: u32) -> u32 {
    fiber / FIBERS_PER_SPECTROGRAPH
}

/// Kind of spectra product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecType {
    #[default]
    Coadd,
    Cframe,
    Spectra,
}

impl SpecType {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecType::Coadd => "coadd",
            SpecType::Cframe => "cframe",
            SpecType::Spectra => "spectra",
        }
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecType {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coadd" => Ok(SpecType::Coadd),
            "cframe" => Ok(SpecType::Cframe),
            "spectra" => Ok(SpecType::Spectra),
            other => Err(PathError::UnknownSpecType(other.to_string())),
        }
    }
}

/// Where in the archive an object's spectra are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Locator {
    Healpix {
        survey: String,
        program: String,
        healpix: u32,
    },
    Tile {
        tile_id: u32,
        /// Observing night (`20201220`) or a coadd label such as `all` or `deep`.
        night: String,
        spectrograph: u32,
    },
    /// Coadd of all exposures of a tile up to and including `night`.
    CumulativeTile {
        tile_id: u32,
        night: String,
        spectrograph: u32,
    },
}

impl Locator {
    fn grouping(&self) -> &'static str {
        match self {
            Locator::Healpix { .. } => "healpix",
            Locator::Tile { .. } => "tiles",
            Locator::CumulativeTile { .. } => "tiles/cumulative",
        }
    }

    /// Directory (relative to a redux or RV root) and file stem for this grouping.
    fn dir_and_stem(&self, spec_type: SpecType) -> (String, String) {
        match self {
            Locator::Healpix {
                survey,
                program,
                healpix,
            } => (
                format!("healpix/{}/{}/{}/{}", survey, program, healpix / 100, healpix),
                format!("{}-{}-{}-{}", spec_type, survey, program, healpix),
            ),
            Locator::Tile {
                tile_id,
                night,
                spectrograph,
            } => (
                format!("tiles/{}/{}", tile_id, night),
                format!("{}-{}-{}-{}", spec_type, spectrograph, tile_id, night),
            ),
            Locator::CumulativeTile {
                tile_id,
                night,
                spectrograph,
            } => (
                format!("tiles/cumulative/{}/{}", tile_id, night),
                format!("{}-{}-{}-thru{}", spec_type, spectrograph, tile_id, night),
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("unknown spectra type '{0}' (expected coadd, cframe or spectra)")]
    UnknownSpecType(String),

    #[error("release {release} only provides per-night tile spectra, not {grouping}")]
    UnsupportedGrouping {
        release: Release,
        grouping: &'static str,
    },
}

/// Path of a spectra file, relative to the archive root.
pub fn spectra_path(
    release: Release,
    spec_type: SpecType,
    locator: &Locator,
) -> Result<String, PathError> {
    let redux = format!(
        "{}/spectro/redux/{}",
        release.redux_root(),
        release.dataset()
    );
    match release.layout() {
        Layout::Modern => {
            let (dir, stem) = locator.dir_and_stem(spec_type);
            Ok(format!("{}/{}/{}.fits", redux, dir, stem))
        }
        Layout::Legacy => {
            let (dir, stem) = legacy_dir_and_stem(release, spec_type, locator)?;
            Ok(format!("{}/{}/{}.fits", redux, dir, stem))
        }
    }
}

/// Path of an RVSpecFit model file, relative to the archive root.
pub fn model_path(
    release: Release,
    run: &str,
    spec_type: SpecType,
    locator: &Locator,
) -> Result<String, PathError> {
    let rv_root = release.rv_root(run);
    match release.layout() {
        Layout::Modern => {
            let (dir, stem) = locator.dir_and_stem(spec_type);
            Ok(format!("{}/{}/rvmod_{}.fits", rv_root, dir, stem))
        }
        Layout::Legacy => {
            let (dir, stem) = legacy_dir_and_stem(release, spec_type, locator)?;
            // Legacy RV outputs drop the `tiles/` level.
            let dir = dir.trim_start_matches("tiles/");
            Ok(format!("{}/{}/rvmod_{}.fits", rv_root, dir, stem))
        }
    }
}

fn legacy_dir_and_stem(
    release: Release,
    spec_type: SpecType,
    locator: &Locator,
) -> Result<(String, String), PathError> {
    match locator {
        Locator::Tile { .. } => Ok(locator.dir_and_stem(spec_type)),
        other => Err(PathError::UnsupportedGrouping {
            release,
            grouping: other.grouping(),
        }),
    }
}
