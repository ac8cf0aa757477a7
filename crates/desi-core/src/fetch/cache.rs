//! Local copies of archive files.
//!
//! A file is stored under the cache directory at the same relative path it
//! has in the archive, so the cache doubles as a partial local mirror. An
//! existing copy is used as-is; there is no expiry or size limit.

use std::path::{Component, Path, PathBuf};

use super::{get_to_writer, FetchError, HttpOptions};

#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the archive file at `relative` is (or would be) cached.
    pub fn path_for(&self, relative: &str) -> Result<PathBuf, FetchError> {
        let rel = Path::new(relative.trim_start_matches('/'));
        let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || rel.as_os_str().is_empty() {
            return Err(FetchError::UnsafeCachePath(relative.to_string()));
        }
        Ok(self.dir.join(rel))
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.path_for(relative).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Returns the cached copy of `url`, downloading it first if needed.
    ///
    /// The body is written to a temporary file next to the final path and
    /// renamed into place only after a complete, successful transfer.
    pub fn fetch(&self, url: &str, relative: &str, opts: &HttpOptions) -> Result<PathBuf, FetchError> {
        let path = self.path_for(relative)?;
        if path.is_file() {
            tracing::debug!(path = %path.display(), "cache hit");
            return Ok(path);
        }
        let parent = path.parent().unwrap_or(&self.dir);
        std::fs::create_dir_all(parent).map_err(|source| FetchError::File {
            path: parent.to_path_buf(),
            source,
        })?;

        tracing::info!(%url, path = %path.display(), "downloading into cache");
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        let bytes = get_to_writer(url, opts, tmp.as_file_mut())?;
        tmp.persist(&path).map_err(|e| FetchError::File {
            path: path.clone(),
            source: e.error,
        })?;
        tracing::debug!(path = %path.display(), bytes, "cached");
        Ok(path)
    }
}
