//! CLI for the DESI spectra retriever.

mod commands;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use desi_core::archive_path::{Locator, SpecType};
use desi_core::config::{self, RetrieverConfig};
use desi_core::extract::{SpectraOptions, TargetSelector};
use desi_core::{tile_locator, ModelRequest, Release, Retriever, SpectraRequest};
use std::path::PathBuf;

use commands::{run_fetch, run_models, run_releases, run_spectra, run_url, Product};

/// Top-level CLI for the DESI spectra retriever.
#[derive(Debug, Parser)]
#[command(name = "desi-retriever")]
#[command(about = "Fetch DESI spectra and RVSpecFit models for a single target", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides for values in config.toml.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Data release: andes, blanc, everest, fuji, jura, loa or dr1 (alias iron).
    #[arg(long, global = true)]
    pub release: Option<Release>,

    /// Archive base URL, or an absolute directory holding a local mirror.
    #[arg(long, global = true, value_name = "URL_OR_DIR")]
    pub archive_root: Option<String>,

    /// Keep downloaded files under this directory and reuse them.
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Ignore any configured cache directory.
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    pub no_cache: bool,
}

impl GlobalArgs {
    pub fn apply(&self, cfg: &mut RetrieverConfig) {
        if let Some(release) = self.release {
            cfg.release = release;
        }
        if let Some(root) = &self.archive_root {
            cfg.archive_root = root.clone();
        }
        if let Some(dir) = &self.cache_dir {
            cfg.cache_dir = Some(dir.clone());
        }
        if self.no_cache {
            cfg.cache_dir = None;
        }
    }
}

/// Which file holds the target: a HEALPix pixel, a tile, or a Gaia source
/// looked up in the release's index.
#[derive(Debug, Args)]
pub struct LocatorArgs {
    /// Gaia EDR3 source id; finds the HEALPix coadd and TARGETID.
    #[arg(
        long,
        conflicts_with_all = ["survey", "program", "healpix", "tile", "night", "targetid", "fiber"]
    )]
    pub gaia_source_id: Option<i64>,

    /// Survey of a HEALPix-grouped file (e.g. main, sv1).
    #[arg(long)]
    pub survey: Option<String>,

    /// Program of a HEALPix-grouped file (e.g. dark, bright).
    #[arg(long)]
    pub program: Option<String>,

    /// HEALPix pixel (nside 64, nested).
    #[arg(long, requires_all = ["survey", "program"], conflicts_with = "tile")]
    pub healpix: Option<u32>,

    /// Tile id.
    #[arg(long, requires = "night")]
    pub tile: Option<u32>,

    /// Observing night (YYYYMMDD), or a coadd label such as `all`.
    #[arg(long)]
    pub night: Option<String>,

    /// Use the cumulative coadd of the tile through `--night`.
    #[arg(long, requires = "tile")]
    pub cumulative: bool,
}

impl LocatorArgs {
    /// `fiber` picks the spectrograph for tile files.
    pub fn locator(&self, fiber: Option<u32>) -> Result<Locator> {
        match (self.healpix, self.tile) {
            (Some(healpix), None) => Ok(Locator::Healpix {
                survey: self.survey.clone().context("--healpix needs --survey")?,
                program: self.program.clone().context("--healpix needs --program")?,
                healpix,
            }),
            (None, Some(tile)) => {
                let night = self.night.as_deref().context("--tile needs --night")?;
                Ok(tile_locator(tile, night, fiber, self.cumulative)?)
            }
            _ => bail!("give --survey/--program/--healpix, --tile/--night or --gaia-source-id"),
        }
    }

    /// Locator and selector for the request, from the index when a Gaia source is given.
    pub fn resolve(
        &self,
        retriever: &Retriever,
        target: &TargetArgs,
    ) -> Result<(Locator, TargetSelector)> {
        match self.gaia_source_id {
            Some(source_id) => {
                let found = retriever.find_gaia_source(source_id)?;
                let mut selector = found.selector();
                selector.exp_id = target.expid;
                Ok((found.locator(), selector))
            }
            None => Ok((self.locator(target.fiber)?, target.selector())),
        }
    }
}

/// The object to extract from the file.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// DESI TARGETID.
    #[arg(long)]
    pub targetid: Option<i64>,

    /// Fiber number (0-4999); also selects the spectrograph for tile files.
    #[arg(long)]
    pub fiber: Option<u32>,

    /// Restrict to one exposure.
    #[arg(long)]
    pub expid: Option<i64>,

    /// Product type: coadd, cframe or spectra.
    #[arg(long, default_value = "coadd")]
    pub spec_type: SpecType,
}

impl TargetArgs {
    pub fn selector(&self) -> TargetSelector {
        TargetSelector {
            target_id: self.targetid,
            fiber: self.fiber,
            exp_id: self.expid,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Extract a target's spectra and print them as JSON.
    Spectra {
        #[command(flatten)]
        locator: LocatorArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// Include the pixel mask.
        #[arg(long)]
        mask: bool,
        /// Include the inverse variance.
        #[arg(long)]
        ivar: bool,
        /// Include the FIBERMAP row.
        #[arg(long)]
        fibermap: bool,
        /// Write JSON here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Extract a target's RVSpecFit models and print them as JSON.
    Models {
        #[command(flatten)]
        locator: LocatorArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// RVSpecFit run (defaults to the release's).
        #[arg(long)]
        run: Option<String>,
        /// Write JSON here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print where a spectra (or model) file lives.
    Url {
        #[command(flatten)]
        locator: LocatorArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// The RVSpecFit model file instead of the spectra file.
        #[arg(long)]
        models: bool,
        #[arg(long)]
        run: Option<String>,
    },

    /// Save a whole spectra (or model) file.
    Fetch {
        #[command(flatten)]
        locator: LocatorArgs,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        models: bool,
        #[arg(long)]
        run: Option<String>,
        /// Destination path (default: the archive file name in the current directory).
        dest: Option<PathBuf>,
    },

    /// List known data releases.
    Releases,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        cli.global.apply(&mut cfg);
        tracing::debug!("effective config: {:?}", cfg);

        let retriever = || Retriever::new(&cfg, cfg.release);

        match cli.command {
            CliCommand::Spectra {
                locator,
                target,
                mask,
                ivar,
                fibermap,
                output,
            } => {
                let retriever = retriever()?;
                let (locator, selector) = locator.resolve(&retriever, &target)?;
                let req = SpectraRequest {
                    locator,
                    spec_type: target.spec_type,
                    selector,
                    options: SpectraOptions {
                        mask,
                        ivar,
                        fibermap,
                    },
                };
                run_spectra(&retriever, &req, output.as_deref())?;
            }
            CliCommand::Models {
                locator,
                target,
                run,
                output,
            } => {
                let retriever = retriever()?;
                let (locator, selector) = locator.resolve(&retriever, &target)?;
                let req = ModelRequest {
                    locator,
                    spec_type: target.spec_type,
                    selector,
                    run,
                };
                run_models(&retriever, &req, output.as_deref())?;
            }
            CliCommand::Url {
                locator,
                target,
                models,
                run,
            } => {
                let retriever = retriever()?;
                let (locator, _) = locator.resolve(&retriever, &target)?;
                let product = Product::new(models, run.as_deref());
                run_url(&retriever, target.spec_type, &locator, product)?;
            }
            CliCommand::Fetch {
                locator,
                target,
                models,
                run,
                dest,
            } => {
                let retriever = retriever()?;
                let (locator, _) = locator.resolve(&retriever, &target)?;
                let product = Product::new(models, run.as_deref());
                run_fetch(
                    &retriever,
                    target.spec_type,
                    &locator,
                    product,
                    dest.as_deref(),
                )?;
            }
            CliCommand::Releases => run_releases(cfg.release)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
