use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdred_core::engine::native::compute_statistic;
use ccdred_core::engine::StatField;
use ccdred_core::io::fits::{read_fits, read_header};
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,

    /// Also read the pixels and print basic statistics
    #[arg(long)]
    pub stats: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let header = read_header(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let text = |keyword: &str| {
        header
            .get(keyword)
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into())
    };

    println!("File:        {}", args.file.display());
    println!(
        "Dimensions:  {}x{}",
        header.get_i64("NAXIS1").unwrap_or(0),
        header.get_i64("NAXIS2").unwrap_or(0)
    );
    println!("Bit depth:   {}", text("BITPIX"));
    println!("Object:      {}", text("OBJECT"));
    println!("Type:        {}", text("IMAGETYP"));
    println!("Filter:      {}", text("FILTER"));
    println!("Exposure:    {}", text("EXPTIME"));
    println!("Airmass:     {}", text("AIRMASS"));

    if args.stats {
        let image = read_fits(&args.file)?;
        let fields = [
            StatField::Mean,
            StatField::Midpt,
            StatField::Stddev,
            StatField::Min,
            StatField::Max,
        ];
        for field in fields {
            match compute_statistic(&image.data, field) {
                Some(value) => println!("{:<13}{value:.3}", format!("{field}:")),
                None => println!("{:<13}-", format!("{field}:")),
            }
        }
    }

    Ok(())
}
