//! Archive roots: the HTTP server, or a local mirror of the same tree.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

/// Public DESI data server.
pub const DEFAULT_ARCHIVE_ROOT: &str = "https://data.desi.lbl.gov/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveRoot {
    Http(Url),
    /// A directory laid out like the archive (e.g. a mounted project filesystem).
    Local(PathBuf),
}

impl FromStr for ArchiveRoot {
    type Err = url::ParseError;

    /// A root starting with `/` is a local directory, anything else must be a URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('/') {
            return Ok(ArchiveRoot::Local(PathBuf::from(s)));
        }
        let mut url = Url::parse(s)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(ArchiveRoot::Http(url))
    }
}

impl fmt::Display for ArchiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveRoot::Http(url) => write!(f, "{}", url),
            ArchiveRoot::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl ArchiveRoot {
    /// Resolves a path relative to the root (as built by [`super::spectra_path`]).
    pub fn resolve(&self, relative: &str) -> Result<Location, url::ParseError> {
        let relative = relative.trim_start_matches('/');
        match self {
            ArchiveRoot::Http(base) => Ok(Location::Remote {
                url: base.join(relative)?,
                relative: relative.to_string(),
            }),
            ArchiveRoot::Local(dir) => Ok(Location::Local(dir.join(relative))),
        }
    }
}

/// A concrete file in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote {
        url: Url,
        /// Path below the archive root; also the path below the cache directory.
        relative: String,
    },
    Local(PathBuf),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote { url, .. } => write!(f, "{}", url),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
