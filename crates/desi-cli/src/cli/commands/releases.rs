//! `desi-retriever releases`: list the release presets.

use anyhow::Result;
use desi_core::Release;

pub fn run_releases(current: Release) -> Result<()> {
    println!(
        "{:<8} {:<8} {:<8} {:<6} {:<6} {}",
        "RELEASE", "DATASET", "RV-RUN", "AUTH", "GAIA", "REDUX ROOT"
    );
    for &r in Release::all() {
        let marker = if r == current { " (default)" } else { "" };
        println!(
            "{:<8} {:<8} {:<8} {:<6} {:<6} {}{}",
            r.name(),
            r.dataset(),
            r.default_rv_run(),
            if r.requires_auth() { "yes" } else { "no" },
            if r.gaia_index().is_some() { "yes" } else { "no" },
            r.redux_root(),
            marker
        );
    }
    Ok(())
}
