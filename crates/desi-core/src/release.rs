//! Data release presets: where each DESI reduction lives in the archive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::gaia_index::{GaiaIndexSource, IndexDir, IndexFormat};

/// How spectra files of a release are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Early releases: per-tile, per-night directories only.
    Legacy,
    /// HEALPix, per-night tile and cumulative tile groupings.
    Modern,
}

/// A DESI data release the archive serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Release {
    Andes,
    Blanc,
    Everest,
    Fuji,
    Jura,
    #[default]
    Loa,
    /// Public DR1 (the `iron` reduction).
    Dr1,
}

impl Release {
    pub fn all() -> &'static [Release] {
        &[
            Release::Andes,
            Release::Blanc,
            Release::Everest,
            Release::Fuji,
            Release::Jura,
            Release::Loa,
            Release::Dr1,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Release::Andes => "andes",
            Release::Blanc => "blanc",
            Release::Everest => "everest",
            Release::Fuji => "fuji",
            Release::Jura => "jura",
            Release::Loa => "loa",
            Release::Dr1 => "dr1",
        }
    }

    /// Name of the spectroscopic reduction used in archive paths.
    pub fn dataset(self) -> &'static str {
        match self {
            Release::Dr1 => "iron",
            other => other.name(),
        }
    }

    /// Prefix of the release below the archive root.
    pub fn redux_root(self) -> &'static str {
        match self {
            Release::Dr1 => "public/dr1",
            _ => "desi",
        }
    }

    /// Directory holding RVSpecFit outputs for `run`, below the archive root.
    pub fn rv_root(self, run: &str) -> String {
        match self {
            Release::Dr1 => format!(
                "public/dr1/vac/dr1/mws/{}/v1.0/rv_output/{}",
                self.dataset(),
                run
            ),
            _ => format!(
                "desi/science/mws/redux/{}/rv_output/{}",
                self.dataset(),
                run
            ),
        }
    }

    /// RVSpecFit run used when the caller does not name one.
    pub fn default_rv_run(self) -> &'static str {
        match self {
            Release::Andes => "200507",
            Release::Blanc => "210112",
            Release::Everest => "210803",
            Release::Fuji => "220309",
            Release::Dr1 => "240520",
            Release::Jura | Release::Loa => "240620",
        }
    }

    pub fn layout(self) -> Layout {
        match self {
            Release::Andes | Release::Blanc => Layout::Legacy,
            _ => Layout::Modern,
        }
    }

    /// Whether the release sits behind the collaboration's HTTP login.
    pub fn requires_auth(self) -> bool {
        !matches!(self, Release::Dr1)
    }

    /// Where the Gaia EDR3 source-id index of the release's HEALPix coadds lives.
    pub fn gaia_index(self) -> Option<GaiaIndexSource> {
        const USER_DB: &str = "desi/users/koposov/gaiaid_db";
        const USER_DB_INDEXES: &str = "desi/users/koposov/gaiaid_db/indexes";
        let source = match self {
            Release::Andes | Release::Blanc => return None,
            Release::Everest => GaiaIndexSource {
                dir: IndexDir::Archive(USER_DB),
                format: IndexFormat::FitsTable {
                    file: "gaia-everest-coadd-hpx-index.fits",
                },
            },
            Release::Fuji => GaiaIndexSource {
                dir: IndexDir::Archive(USER_DB_INDEXES),
                format: IndexFormat::FitsTable {
                    file: "gaia-fuji-coadd-hpx-index.fits",
                },
            },
            Release::Jura => GaiaIndexSource {
                dir: IndexDir::Archive(USER_DB),
                format: IndexFormat::Pickled {
                    keys: "aa.parquet",
                    rows: "aa.bin",
                },
            },
            Release::Loa => GaiaIndexSource {
                dir: IndexDir::Archive(USER_DB_INDEXES),
                format: IndexFormat::Pickled {
                    keys: "gaia-index-loa-coadd_241127.parquet",
                    rows: "gaia-index-loa-coadd_241127.bin",
                },
            },
            Release::Dr1 => GaiaIndexSource {
                dir: IndexDir::Url("https://portal.nersc.gov/project/desi/users/koposov/dr1/gaia_id_db"),
                format: IndexFormat::Pickled {
                    keys: "gaia-index-dr1-coadd_250319.parquet",
                    rows: "gaia-index-dr1-coadd_250319.bin",
                },
            },
        };
        Some(source)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data release '{0}' (expected one of andes, blanc, everest, fuji, jura, loa, dr1, iron)")]
pub struct UnknownRelease(pub String);

impl FromStr for Release {
    type Err = UnknownRelease;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "andes" => Ok(Release::Andes),
            "blanc" => Ok(Release::Blanc),
            "everest" => Ok(Release::Everest),
            "fuji" => Ok(Release::Fuji),
            "jura" => Ok(Release::Jura),
            "loa" => Ok(Release::Loa),
            "dr1" | "iron" => Ok(Release::Dr1),
            other => Err(UnknownRelease(other.to_string())),
        }
    }
}
