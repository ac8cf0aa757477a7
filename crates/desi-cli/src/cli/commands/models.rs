//! `desi-retriever models`: extract a target's RVSpecFit models as JSON.

use anyhow::Result;
use desi_core::{ModelRequest, Retriever};
use std::path::Path;

use super::write_json;

pub fn run_models(retriever: &Retriever, req: &ModelRequest, output: Option<&Path>) -> Result<()> {
    let models = retriever.get_models(req)?;
    if models.is_empty() {
        eprintln!("No models found for {:?}.", req.selector);
    }
    write_json(&models, output)
}
