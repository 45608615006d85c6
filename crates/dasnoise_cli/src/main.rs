use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::debug;

use dasnoise_cli::commands;
use dasnoise_cli::report::{format_comparison, format_run_summary, format_sweep};
use dasnoise_cli::{RunConfig, SignalSource};
use dasnoise_core::{DenoiseMethod, NoiseLevel};

/// Inject noise into DAS signal matrices, denoise them and score the result
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured pipeline once and write heatmaps and a report
    Run(CommonArgs),
    /// Score every denoiser on the same noisy matrix
    Compare(CommonArgs),
    /// Run the configured denoiser over a range of Gaussian noise levels
    Sweep {
        #[command(flatten)]
        common: CommonArgs,

        /// SNR levels in dB (comma separated)
        #[arg(long, value_delimiter = ',')]
        snr_db: Vec<f64>,

        /// Absolute noise standard deviations (comma separated)
        #[arg(long, value_delimiter = ',')]
        sigma: Vec<f64>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input matrix (.tif/.tiff, .csv/.txt/.tsv, .h5/.hdf5/.mat); overrides [source]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Dataset path inside an HDF5 or MATLAB file
    #[arg(long)]
    dataset: Option<String>,

    /// Noise seed; overrides [pipeline].seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Output directory; overrides [output].dir
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Denoiser with default parameters; overrides [pipeline.denoise]
    #[arg(short, long)]
    method: Option<DenoiseMethod>,

    /// Skip PNG heatmaps
    #[arg(long)]
    no_heatmaps: bool,

    /// Channels to plot as trace_<ch>.png (comma separated); overrides [output]
    #[arg(long, value_delimiter = ',')]
    trace: Vec<usize>,
}

impl CommonArgs {
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(input) = &self.input {
            config.source = SignalSource::from_path(input, self.dataset.as_deref())?;
        }
        if let Some(seed) = self.seed {
            config.pipeline.seed = Some(seed);
        }
        if let Some(dir) = &self.output {
            config.output.dir = dir.clone();
        }
        if let Some(method) = self.method {
            if config.pipeline.denoise.method() != method {
                config.pipeline.denoise = method.default_spec();
            }
        }
        if self.no_heatmaps {
            config.output.heatmaps = false;
        }
        if !self.trace.is_empty() {
            config.output.trace_channels = self.trace.clone();
        }

        config.validate()?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Command::Run(args) => {
            let config = args.resolve()?;
            let run = commands::run(&config)?;
            print!("{}", format_run_summary(&run));
            println!("Outputs written to {}", config.output.dir.display());
        }
        Command::Compare(args) => {
            let config = args.resolve()?;
            let report = commands::compare(&config)?;
            print!("{}", format_comparison(&report));
        }
        Command::Sweep {
            common,
            snr_db,
            sigma,
        } => {
            let config = common.resolve()?;
            let levels: Vec<NoiseLevel> = snr_db
                .into_iter()
                .map(NoiseLevel::SnrDb)
                .chain(sigma.into_iter().map(NoiseLevel::Sigma))
                .collect();
            let report = commands::sweep(&config, &levels)?;
            print!("{}", format_sweep(&report));
        }
    }

    Ok(())
}
