//! CLI command handlers, one file per subcommand.

mod fetch;
mod models;
mod releases;
mod spectra;
mod url;

pub use fetch::run_fetch;
pub use models::run_models;
pub use releases::run_releases;
pub use spectra::run_spectra;
pub use url::run_url;

use anyhow::{Context, Result};
use desi_core::archive_path::{Locator, Location, SpecType};
use desi_core::Retriever;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Which archive file a `url` or `fetch` command refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product<'a> {
    Spectra,
    /// RVSpecFit models; `run` defaults to the release's.
    Models { run: Option<&'a str> },
}

impl<'a> Product<'a> {
    pub fn new(models: bool, run: Option<&'a str>) -> Self {
        if models {
            Product::Models { run }
        } else {
            Product::Spectra
        }
    }

    fn location(
        self,
        retriever: &Retriever,
        spec_type: SpecType,
        locator: &Locator,
    ) -> Result<Location> {
        Ok(match self {
            Product::Spectra => retriever.spectra_location(spec_type, locator)?,
            Product::Models { run } => retriever.model_location(run, spec_type, locator)?,
        })
    }
}

/// Pretty JSON to `output`, or to stdout when none is given.
fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, value)?;
            w.flush()?;
            tracing::info!("wrote {}", path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
