mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdred", about = "CCD night reduction: master frames and calibrated objects")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce one night: organize, build masters, calibrate objects
    Run(commands::pipeline::RunArgs),
    /// Print the observation catalog of a directory of raw frames
    Catalog(commands::catalog::CatalogArgs),
    /// Show FITS header summary and dimensions
    Info(commands::info::InfoArgs),
    /// Print or save the default reduction config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The run config may ask for debug output, so it is loaded before the
    // subscriber is installed.
    let run_config = match &cli.command {
        Commands::Run(args) => Some(commands::pipeline::load_config(args)?),
        _ => None,
    };
    let debug = cli.verbose || run_config.as_ref().is_some_and(|c| c.debug);

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => {
            let config = match run_config {
                Some(config) => config,
                None => commands::pipeline::load_config(args)?,
            };
            commands::pipeline::run(args, config)
        }
        Commands::Catalog(args) => commands::catalog::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
