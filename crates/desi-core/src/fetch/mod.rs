//! Authenticated HTTP access to archive files.
//!
//! Uses the curl crate (libcurl). A file is either streamed whole (into
//! memory, the cache directory, a temporary file or a destination path) or
//! read lazily in fixed-size blocks through HTTP Range requests. Nothing is
//! retried: the first failure is returned to the caller.

mod cache;
mod get;
mod head;
mod range_reader;

pub use cache::Cache;
pub use get::get_to_writer;
pub use head::{probe, HeadResult};
pub use range_reader::{RangeReader, BLOCK_SIZE};

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::archive_path::Location;
use crate::credentials::Credentials;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Curl { url: String, source: curl::Error },

    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u32 },

    #[error("partial transfer from {url}: expected {expected} bytes, got {received}")]
    PartialTransfer {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("refusing to cache {0}: path escapes the cache directory")]
    UnsafeCachePath(String),

    #[error("{}: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    pub(crate) fn curl(url: &str) -> impl FnOnce(curl::Error) -> FetchError + '_ {
        move |source| FetchError::Curl {
            url: url.to_string(),
            source,
        }
    }

    /// HTTP status, if the server answered with a non-success code.
    pub fn status(&self) -> Option<u32> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Transfer settings shared by every request.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Upper bound on a whole transfer.
    pub timeout: Duration,
    pub verify_tls: bool,
    pub credentials: Option<Credentials>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(600),
            verify_tls: true,
            credentials: None,
        }
    }
}

impl HttpOptions {
    /// A curl handle for `url` with redirects, timeouts, TLS policy and basic auth applied.
    pub(crate) fn easy(&self, url: &str) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.useragent(concat!("desi-retriever/", env!("CARGO_PKG_VERSION")))?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        easy.ssl_verify_peer(self.verify_tls)?;
        easy.ssl_verify_host(self.verify_tls)?;
        if let Some(creds) = &self.credentials {
            let mut auth = curl::easy::Auth::new();
            auth.basic(true);
            easy.http_auth(&auth)?;
            easy.username(&creds.user)?;
            easy.password(&creds.password)?;
        }
        Ok(easy)
    }
}

/// A seekable view of an archive file, wherever its bytes come from.
#[derive(Debug)]
pub enum ArchiveReader {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
    Remote(RangeReader),
}

impl Read for ArchiveReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ArchiveReader::File(f) => f.read(buf),
            ArchiveReader::Memory(m) => m.read(buf),
            ArchiveReader::Remote(r) => r.read(buf),
        }
    }
}

impl Seek for ArchiveReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ArchiveReader::File(f) => f.seek(pos),
            ArchiveReader::Memory(m) => m.seek(pos),
            ArchiveReader::Remote(r) => r.seek(pos),
        }
    }
}

fn open_file(path: &Path) -> Result<ArchiveReader, FetchError> {
    let file = File::open(path).map_err(|source| FetchError::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ArchiveReader::File(BufReader::new(file)))
}

/// Opens an archive file for reading.
///
/// Local files are opened directly. Remote files go through the cache when
/// one is given; otherwise they are read with Range requests if the server
/// supports them, and fetched whole into memory if it does not.
pub fn open_location(
    location: &Location,
    opts: &HttpOptions,
    cache: Option<&Cache>,
) -> Result<ArchiveReader, FetchError> {
    match location {
        Location::Local(path) => {
            tracing::debug!(path = %path.display(), "opening local archive file");
            open_file(path)
        }
        Location::Remote { url, relative } => {
            if let Some(cache) = cache {
                let path = cache.fetch(url.as_str(), relative, opts)?;
                return open_file(&path);
            }
            let head = match probe(url.as_str(), opts) {
                Ok(h) => Some(h),
                // Some servers refuse HEAD; a plain GET still works.
                Err(FetchError::Http { status: 405, .. }) | Err(FetchError::Http { status: 501, .. }) => {
                    None
                }
                Err(e) => return Err(e),
            };
            match head {
                Some(HeadResult {
                    content_length: Some(len),
                    accept_ranges: true,
                }) => {
                    tracing::debug!(%url, len, "reading remote file with range requests");
                    Ok(ArchiveReader::Remote(RangeReader::new(
                        url.as_str(),
                        len,
                        opts.clone(),
                    )?))
                }
                _ => {
                    tracing::debug!(%url, "server does not serve ranges, fetching whole file");
                    let mut body = Vec::new();
                    get_to_writer(url.as_str(), opts, &mut body)?;
                    Ok(ArchiveReader::Memory(Cursor::new(body)))
                }
            }
        }
    }
}

/// A local file holding an archive file's bytes.
#[derive(Debug)]
pub enum StagedFile {
    /// Read in place: a local mirror file or a cached copy.
    Path(PathBuf),
    /// Downloaded for this read only; deleted on drop.
    Temp(tempfile::NamedTempFile),
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        match self {
            StagedFile::Path(p) => p,
            StagedFile::Temp(t) => t.path(),
        }
    }
}

/// Makes an archive file available on local disk, for readers that need a path.
///
/// Local files are used in place. Remote files go to the cache when one is
/// given, otherwise to a temporary file that lives as long as the returned
/// [`StagedFile`].
pub fn stage_location(
    location: &Location,
    opts: &HttpOptions,
    cache: Option<&Cache>,
) -> Result<StagedFile, FetchError> {
    match location {
        Location::Local(path) => {
            let meta = std::fs::metadata(path).map_err(|source| FetchError::File {
                path: path.clone(),
                source,
            })?;
            if !meta.is_file() {
                return Err(FetchError::File {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                });
            }
            Ok(StagedFile::Path(path.clone()))
        }
        Location::Remote { url, relative } => {
            if let Some(cache) = cache {
                return Ok(StagedFile::Path(cache.fetch(url.as_str(), relative, opts)?));
            }
            let mut tmp = tempfile::Builder::new()
                .prefix("desi-retriever-")
                .suffix(".fits")
                .tempfile()?;
            let bytes = get_to_writer(url.as_str(), opts, tmp.as_file_mut())?;
            tracing::debug!(%url, bytes, path = %tmp.path().display(), "staged remote file");
            Ok(StagedFile::Temp(tmp))
        }
    }
}

/// Saves a whole archive file to `dest`. Returns the number of bytes written.
pub fn download(location: &Location, opts: &HttpOptions, dest: &Path) -> Result<u64, FetchError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    let written = match location {
        Location::Local(path) => {
            let mut src = File::open(path).map_err(|source| FetchError::File {
                path: path.clone(),
                source,
            })?;
            io::copy(&mut src, tmp.as_file_mut())?
        }
        Location::Remote { url, .. } => get_to_writer(url.as_str(), opts, tmp.as_file_mut())?,
    };
    tmp.persist(dest).map_err(|e| FetchError::File {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    tracing::info!(%location, dest = %dest.display(), bytes = written, "download complete");
    Ok(written)
}
