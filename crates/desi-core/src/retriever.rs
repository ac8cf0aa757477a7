//! One-call access to a target's spectra and models.
//!
//! Ties the three stages together: build the archive path for the release,
//! open the file (locally, through the cache, or over HTTP), then slice the
//! target's rows out of it. Objects can also be found by Gaia source id
//! through the release's index.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive_path::{
    model_path, spectra_path, spectrograph_for_fiber, ArchiveRoot, Locator, Location, SpecType,
};
use crate::config::RetrieverConfig;
use crate::credentials::Credentials;
use crate::error::RetrieverError;
use crate::extract::{
    read_models, read_spectra, ModelSpectrum, SpectraOptions, Spectrum, TargetSelector,
};
use crate::fetch::{download, open_location, stage_location, Cache, HttpOptions, StagedFile};
use crate::fits::FitsFile;
use crate::gaia_index::{
    lookup_fits_table, read_record, read_row_fields, GaiaIndexError, GaiaMatch, IndexFormat,
    KeyIndex,
};
use crate::release::Release;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectraRequest {
    pub locator: Locator,
    pub spec_type: SpecType,
    pub selector: TargetSelector,
    pub options: SpectraOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub locator: Locator,
    pub spec_type: SpecType,
    pub selector: TargetSelector,
    /// RVSpecFit run; the release default when `None`.
    pub run: Option<String>,
}

/// Tile locator for the spectrograph that observed `fiber`.
pub fn tile_locator(
    tile_id: u32,
    night: &str,
    fiber: Option<u32>,
    cumulative: bool,
) -> Result<Locator, RetrieverError> {
    let fiber = fiber.ok_or(RetrieverError::FiberRequired { tile_id })?;
    let spectrograph = spectrograph_for_fiber(fiber);
    let night = night.to_string();
    Ok(if cumulative {
        Locator::CumulativeTile {
            tile_id,
            night,
            spectrograph,
        }
    } else {
        Locator::Tile {
            tile_id,
            night,
            spectrograph,
        }
    })
}

#[derive(Debug, Clone)]
pub struct Retriever {
    release: Release,
    root: ArchiveRoot,
    gaia_root: Option<ArchiveRoot>,
    http: HttpOptions,
    credentials_path: Option<PathBuf>,
    cache: Option<Cache>,
}

impl Retriever {
    pub fn new(config: &RetrieverConfig, release: Release) -> Result<Self, RetrieverError> {
        let root: ArchiveRoot = config.archive_root.parse()?;
        let gaia_root = config
            .gaia_index_root
            .as_deref()
            .map(str::parse::<ArchiveRoot>)
            .transpose()?;
        Ok(Self {
            release,
            root,
            gaia_root,
            http: config.http.http_options(),
            credentials_path: config.credentials_path.clone(),
            cache: config.cache_dir.as_ref().map(Cache::new),
        })
    }

    pub fn spectra_location(
        &self,
        spec_type: SpecType,
        locator: &Locator,
    ) -> Result<Location, RetrieverError> {
        let relative = spectra_path(self.release, spec_type, locator)?;
        Ok(self.root.resolve(&relative)?)
    }

    pub fn model_location(
        &self,
        run: Option<&str>,
        spec_type: SpecType,
        locator: &Locator,
    ) -> Result<Location, RetrieverError> {
        let run = run.unwrap_or(self.release.default_rv_run());
        let relative = model_path(self.release, run, spec_type, locator)?;
        Ok(self.root.resolve(&relative)?)
    }

    /// All observations of the requested target; empty when it is not in the file.
    pub fn get_spectra(&self, req: &SpectraRequest) -> Result<Vec<Spectrum>, RetrieverError> {
        if req.selector.is_empty() {
            return Err(RetrieverError::NoTargetSelector);
        }
        let location = self.spectra_location(req.spec_type, &req.locator)?;
        let (_staged, mut fits) = self.open(&location)?;
        read_spectra(&mut fits, &req.selector, req.options).map_err(|source| {
            RetrieverError::Fits {
                location: location.to_string(),
                source,
            }
        })
    }

    pub fn get_models(&self, req: &ModelRequest) -> Result<Vec<ModelSpectrum>, RetrieverError> {
        if req.selector.is_empty() {
            return Err(RetrieverError::NoTargetSelector);
        }
        let location = self.model_location(req.run.as_deref(), req.spec_type, &req.locator)?;
        let (_staged, mut fits) = self.open(&location)?;
        read_models(&mut fits, &req.selector).map_err(|source| RetrieverError::Fits {
            location: location.to_string(),
            source,
        })
    }

    /// Saves the whole spectra file to `dest`; returns its location and size.
    pub fn download_spectra(
        &self,
        spec_type: SpecType,
        locator: &Locator,
        dest: &Path,
    ) -> Result<(Location, u64), RetrieverError> {
        let location = self.spectra_location(spec_type, locator)?;
        let bytes = download(&location, &self.http_for(&location)?, dest)?;
        Ok((location, bytes))
    }

    pub fn download_models(
        &self,
        run: Option<&str>,
        spec_type: SpecType,
        locator: &Locator,
        dest: &Path,
    ) -> Result<(Location, u64), RetrieverError> {
        let location = self.model_location(run, spec_type, locator)?;
        let bytes = download(&location, &self.http_for(&location)?, dest)?;
        Ok((location, bytes))
    }

    /// Finds the coadd and TARGETID of a Gaia EDR3 source in the release's index.
    pub fn find_gaia_source(&self, source_id: i64) -> Result<GaiaMatch, RetrieverError> {
        let source = self
            .release
            .gaia_index()
            .ok_or(RetrieverError::NoGaiaIndex(self.release))?;
        let locate = |file: &str| source.location(file, &self.root, self.gaia_root.as_ref());
        let found = match source.format {
            IndexFormat::FitsTable { file } => {
                let location = locate(file)?;
                let (_staged, mut fits) = self.open(&location)?;
                lookup_fits_table(&mut fits, source_id).map_err(gaia_error(&location))?
            }
            IndexFormat::Pickled { keys, rows } => {
                let keys_location = locate(keys)?;
                tracing::info!(
                    release = %self.release,
                    location = %keys_location,
                    "reading Gaia key index"
                );
                let staged = stage_location(
                    &keys_location,
                    &self.http_for(&keys_location)?,
                    self.cache.as_ref(),
                )?;
                let index = File::open(staged.path())
                    .map_err(GaiaIndexError::from)
                    .and_then(KeyIndex::read_parquet)
                    .map_err(gaia_error(&keys_location))?;
                match index.find(source_id) {
                    None => None,
                    Some(span) => {
                        // Only the field names and one record are read from the row file.
                        let rows_location = locate(rows)?;
                        let mut reader =
                            open_location(&rows_location, &self.http_for(&rows_location)?, None)?;
                        let record = read_row_fields(&mut reader).and_then(|fields| {
                            read_record(&mut reader, &fields, span, source_id)
                        });
                        Some(record.map_err(gaia_error(&rows_location))?)
                    }
                }
            }
        };
        let found = found.ok_or(RetrieverError::GaiaSourceNotFound {
            source_id,
            release: self.release,
        })?;
        tracing::info!(
            source_id,
            target_id = found.target_id,
            locator = ?found.locator(),
            "found Gaia source"
        );
        Ok(found)
    }

    /// Opens a FITS file; the staged copy must outlive the returned handle.
    fn open(&self, location: &Location) -> Result<(StagedFile, FitsFile), RetrieverError> {
        tracing::info!(release = %self.release, %location, "opening");
        let staged = stage_location(location, &self.http_for(location)?, self.cache.as_ref())?;
        let fits = FitsFile::open(staged.path()).map_err(|source| RetrieverError::Fits {
            location: location.to_string(),
            source,
        })?;
        Ok((staged, fits))
    }

    /// Request options for `location`, with credentials when the release needs them.
    fn http_for(&self, location: &Location) -> Result<HttpOptions, RetrieverError> {
        let mut opts = self.http.clone();
        if matches!(location, Location::Remote { .. }) && self.release.requires_auth() {
            opts.credentials = Some(Credentials::from_env_or_file(
                self.credentials_path.as_deref(),
            )?);
        }
        Ok(opts)
    }
}

fn gaia_error(location: &Location) -> impl Fn(GaiaIndexError) -> RetrieverError + '_ {
    move |source| RetrieverError::GaiaIndex {
        location: location.to_string(),
        source,
    }
}
