use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccdred_core::consts::{DEFAULT_TRIM_SECTION, PREVIEW_DIR};
use ccdred_core::engine::{
    CombineMethod, CombineParams, LinearityCoefficients, NativeEngine, Rejection, TrimSection,
};
use ccdred_core::error::{ReductionError, Result as ReductionResult};
use ccdred_core::pipeline::{
    run_reduction_reported, Confirmation, ProgressReporter, ReductionConfig, ReductionStage,
};
use ccdred_core::store::Organized;
use clap::{Args, ValueEnum};
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};

use crate::summary::{print_organized, print_reduction_summary, print_report};

#[derive(Clone, ValueEnum)]
pub enum CameraArg {
    /// New Schmidt CCD
    Schmidt,
    Sbig,
}

#[derive(Clone, ValueEnum)]
pub enum CombineArg {
    Median,
    Average,
}

#[derive(Clone, ValueEnum)]
pub enum RejectArg {
    None,
    Minmax,
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory with the raw frames of one night (default: current directory)
    pub dir: Option<PathBuf>,

    /// Reduction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Trim section applied to every frame, 1-based and inclusive
    #[arg(long, default_value = DEFAULT_TRIM_SECTION)]
    pub trim: String,

    /// Camera whose linearity coefficients are used
    #[arg(long, value_enum, default_value = "schmidt")]
    pub camera: CameraArg,

    /// Explicit linearity coefficients c1,c2,c3 (overrides --camera)
    #[arg(long, value_delimiter = ',', num_args = 3)]
    pub linearity: Option<Vec<f64>>,

    /// Combine method for master frames
    #[arg(long, value_enum, default_value = "median")]
    pub combine: CombineArg,

    /// Pixel rejection before combining
    #[arg(long, value_enum, default_value = "minmax")]
    pub reject: RejectArg,

    /// Low samples rejected per pixel
    #[arg(long, default_value = "1")]
    pub nlow: usize,

    /// High samples rejected per pixel
    #[arg(long, default_value = "1")]
    pub nhigh: usize,

    /// Do not write master frame previews
    #[arg(long)]
    pub no_display: bool,

    /// Verbose tracing and keep working lists on disk
    #[arg(long)]
    pub debug: bool,

    /// Proceed past the confirmation prompt without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Write the reduction report (TOML) to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Build the run config from `--config` or the command line. Flags that
/// only make sense per invocation (`dir`, `--yes`, `--debug`,
/// `--no-display`) override the file.
pub fn load_config(args: &RunArgs) -> Result<ReductionConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid reduction config")?
    } else {
        build_config_from_args(args)?
    };

    if let Some(ref dir) = args.dir {
        config.working_dir = dir.clone();
    }
    config.proceed |= args.yes;
    config.debug |= args.debug;
    if args.no_display {
        config.display = false;
    }
    Ok(config)
}

pub fn run(args: &RunArgs, config: ReductionConfig) -> Result<()> {
    let engine = if config.display {
        NativeEngine::with_previews(config.working_dir.join(PREVIEW_DIR))
    } else {
        NativeEngine::new()
    };
    print_reduction_summary(&config, "native");

    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:24} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = Arc::new(BarReporter { pb: pb.clone() });
    let confirmation = ConsolePrompt {
        proceed: config.proceed,
        pb: pb.clone(),
    };

    let report = match run_reduction_reported(&config, &engine, &confirmation, reporter) {
        Ok(report) => report,
        Err(ReductionError::Declined) => {
            pb.abandon_with_message("Declined");
            println!(
                "\nReduction stopped. Frames stay organized below {}",
                config.working_dir.display()
            );
            return Ok(());
        }
        Err(e) => {
            pb.abandon_with_message("Aborted");
            return Err(e.into());
        }
    };
    pb.finish_with_message("Done");

    print_report(&report);

    if let Some(ref path) = args.report {
        let toml_str = toml::to_string_pretty(&report)?;
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }

    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> Result<ReductionConfig> {
    let trim: TrimSection = args
        .trim
        .parse()
        .with_context(|| format!("Invalid --trim {}", args.trim))?;

    let linearity = match args.linearity.as_deref() {
        Some(&[c1, c2, c3]) => LinearityCoefficients { c1, c2, c3 },
        Some(other) => anyhow::bail!("--linearity needs 3 coefficients, got {}", other.len()),
        None => match args.camera {
            CameraArg::Schmidt => LinearityCoefficients::schmidt(),
            CameraArg::Sbig => LinearityCoefficients::sbig(),
        },
    };

    let combine = CombineParams {
        method: match args.combine {
            CombineArg::Median => CombineMethod::Median,
            CombineArg::Average => CombineMethod::Average,
        },
        reject: match args.reject {
            RejectArg::None => Rejection::None,
            RejectArg::Minmax => Rejection::MinMax,
        },
        nlow: args.nlow,
        nhigh: args.nhigh,
    };

    Ok(ReductionConfig {
        working_dir: args.dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        trim,
        linearity,
        combine,
        ..ReductionConfig::default()
    })
}

/// Drives one progress bar through the reduction stages.
struct BarReporter {
    pb: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: ReductionStage, total_items: Option<usize>) {
        self.pb.reset();
        self.pb.set_length(total_items.unwrap_or(1).max(1) as u64);
        self.pb.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.pb.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.pb.length() {
            self.pb.set_position(len);
        }
    }
}

/// Asks the operator on the terminal, unless `--yes` or `proceed = true`.
struct ConsolePrompt {
    proceed: bool,
    pb: ProgressBar,
}

impl Confirmation for ConsolePrompt {
    fn confirm(&self, organized: &Organized) -> ReductionResult<bool> {
        if self.proceed {
            return Ok(true);
        }
        self.pb.suspend(|| -> ReductionResult<bool> {
            print_organized(organized);
            let term = Term::stdout();
            term.write_str("  Proceed with calibration? [y/N] ")?;
            let answer = term.read_line()?;
            Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
        })
    }
}
