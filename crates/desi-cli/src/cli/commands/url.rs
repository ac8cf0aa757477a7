//! `desi-retriever url`: print the location of a file without fetching it.

use anyhow::Result;
use desi_core::archive_path::{Locator, SpecType};
use desi_core::Retriever;

use super::Product;

pub fn run_url(
    retriever: &Retriever,
    spec_type: SpecType,
    locator: &Locator,
    product: Product<'_>,
) -> Result<()> {
    let location = product.location(retriever, spec_type, locator)?;
    println!("{}", location);
    Ok(())
}
