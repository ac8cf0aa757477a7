//! `desi-retriever fetch`: save a whole archive file.

use anyhow::{Context, Result};
use desi_core::archive_path::{Locator, Location, SpecType};
use desi_core::Retriever;
use std::path::{Path, PathBuf};

use super::Product;

/// Archive file name of `location`.
fn file_name(location: &Location) -> Option<PathBuf> {
    match location {
        Location::Remote { relative, .. } => Path::new(relative).file_name().map(PathBuf::from),
        Location::Local(path) => path.file_name().map(PathBuf::from),
    }
}

pub fn run_fetch(
    retriever: &Retriever,
    spec_type: SpecType,
    locator: &Locator,
    product: Product<'_>,
    dest: Option<&Path>,
) -> Result<()> {
    let location = product.location(retriever, spec_type, locator)?;
    let dest = match dest {
        Some(d) => d.to_path_buf(),
        None => file_name(&location).context("archive path has no file name")?,
    };
    let (location, bytes) = match product {
        Product::Spectra => retriever.download_spectra(spec_type, locator, &dest)?,
        Product::Models { run } => retriever.download_models(run, spec_type, locator, &dest)?,
    };
    println!("{}  {} bytes  {}", dest.display(), bytes, location);
    Ok(())
}
