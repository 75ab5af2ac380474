use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, bail};
use clap::Parser;
use parrec_volume::{
    Converter, NiftiWriter, ScalingMode, SplitConfig, VolumeLoader, converter::OutputRecord,
};

/// Convert a Philips PAR/REC acquisition into NIfTI volumes, optionally
/// splitting it into one file per echo, phase, diffusion direction, label,
/// image type or dynamic.
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// The input .PAR file; the .REC file must lie next to it
    input: PathBuf,

    /// Write one file per echo
    #[arg(short, long)]
    echo: bool,

    /// Write one file per cardiac phase
    #[arg(short, long)]
    phase: bool,

    /// Write one file per b-value and gradient orientation
    #[arg(short, long)]
    diffusion: bool,

    /// Write one file per label type
    #[arg(short, long)]
    label: bool,

    /// Write one file per image type (magnitude, phase, ...)
    #[arg(short, long = "type-mr")]
    type_mr: bool,

    /// Write one file per dynamic scan
    #[arg(short = 's', long = "dynamic-scan")]
    dynamic_scan: bool,

    /// Also write the gradient table as .bval and .bvec files
    #[arg(short, long)]
    gtab: bool,

    /// Store raw pixel values
    #[arg(short = 'P', long, conflicts_with = "display_value")]
    pixel_value: bool,

    /// Store display values (rescale slope and intercept applied)
    #[arg(short = 'D', long)]
    display_value: bool,

    /// Log progress and the composition of every output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn split_config(&self) -> SplitConfig {
        SplitConfig {
            echo: self.echo,
            phase: self.phase,
            diffusion: self.diffusion,
            label: self.label,
            image_type: self.type_mr,
            dynamic: self.dynamic_scan,
        }
    }

    fn scaling_mode(&self) -> ScalingMode {
        if self.pixel_value {
            ScalingMode::PixelValue
        } else if self.display_value {
            ScalingMode::DisplayValue
        } else {
            ScalingMode::FloatingPoint
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn announce(outputs: &[OutputRecord]) {
    for output in outputs {
        println!("{}", output.path.display());
    }
}

/// Returns whether every output was written
fn run(args: &Args) -> anyhow::Result<bool> {
    let scaling = args.scaling_mode();
    log::info!("Using {scaling} scaling");

    let acquisition = VolumeLoader::load(&args.input, scaling)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let base = VolumeLoader::output_base(&args.input);

    if args.gtab && acquisition.gradients.is_none() {
        bail!(
            "{} carries no diffusion gradient information, cannot write .bval/.bvec",
            args.input.display()
        );
    }

    let report = Converter::new(NiftiWriter, args.split_config())
        .convert(&acquisition.stack, &acquisition.metadata, &base)
        .inspect_err(|err| announce(err.written()))
        .context("Conversion aborted")?;
    announce(&report.outputs);

    if let Some(gradients) = acquisition.gradients.as_ref().filter(|_| args.gtab) {
        let (bval, bvec) = gradients
            .write(&base)
            .context("Failed to write gradient table")?;
        println!("{}", bval.display());
        println!("{}", bvec.display());
    }

    if !report.is_success() {
        log::error!("{} of the outputs could not be written", report.failures.len());
    }
    Ok(report.is_success())
}
