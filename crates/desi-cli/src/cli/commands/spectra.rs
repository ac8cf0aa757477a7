//! `desi-retriever spectra`: extract a target's spectra as JSON.

use anyhow::Result;
use desi_core::{Retriever, SpectraRequest};
use std::path::Path;

use super::write_json;

pub fn run_spectra(retriever: &Retriever, req: &SpectraRequest, output: Option<&Path>) -> Result<()> {
    let spectra = retriever.get_spectra(req)?;
    if spectra.is_empty() {
        eprintln!("No spectra found for {:?}.", req.selector);
    }
    write_json(&spectra, output)
}
