use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdred_core::catalog::{discover_raw_frames, extract_catalog};
use ccdred_core::engine::NativeEngine;
use clap::Args;

use crate::summary::print_catalog;

#[derive(Args)]
pub struct CatalogArgs {
    /// Directory with raw frames
    pub dir: PathBuf,

    /// Also print the catalog as TOML
    #[arg(long)]
    pub toml: bool,
}

/// Read the headers of every raw frame and print the catalog. Nothing is
/// copied or created.
pub fn run(args: &CatalogArgs) -> Result<()> {
    let frames = discover_raw_frames(&args.dir)
        .with_context(|| format!("Failed to list {}", args.dir.display()))?;
    let catalog = extract_catalog(&NativeEngine::new(), &args.dir, &frames, false)?;

    print_catalog(&catalog);
    if args.toml {
        print!("{}", toml::to_string_pretty(&catalog)?);
    }
    Ok(())
}
