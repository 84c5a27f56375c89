use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crosswalk_label::{
    BatchProcessor, BatchReport, Detector, DetectorConfig, FileLabelSink, FrequencyBand,
};

#[derive(Parser, Debug)]
#[command(name = "crosswalk-label")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Label crosswalk beacon beeps in the WAV files of a directory.")]
struct Cli {
    /// Process the current directory.
    #[arg(short = 'c', long = "current", conflicts_with = "directory")]
    current: bool,

    /// Process DIRECTORY.
    #[arg(short = 'd', long = "directory", value_name = "DIRECTORY")]
    directory: Option<PathBuf>,

    /// Amplitude threshold in dB.
    #[arg(long, value_name = "DB", allow_negative_numbers = true, conflicts_with = "no_threshold")]
    threshold_db: Option<f64>,

    /// Keep every cell regardless of amplitude.
    #[arg(long)]
    no_threshold: bool,

    /// Search band in Hz as LOW:HIGH. Repeat for several bands; replaces the default band.
    #[arg(long = "band", value_name = "LOW:HIGH")]
    bands: Vec<FrequencyBand>,

    /// Number of worker threads.
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Show a progress bar.
    #[cfg(feature = "progress-tracking")]
    #[arg(long)]
    progress: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Anything unrecognised selects the current directory.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

impl Cli {
    fn detector_config(&self) -> DetectorConfig {
        let mut config = DetectorConfig::new();
        if self.no_threshold {
            config = config.with_amplitude_threshold_db(None);
        } else if let Some(db) = self.threshold_db {
            config = config.with_amplitude_threshold_db(Some(db));
        }
        if !self.bands.is_empty() {
            config = config.with_bands(self.bands.clone());
        }
        config
    }

    /// Directory to process, or `None` when no selecting argument was given.
    fn target_dir(&self) -> Result<Option<PathBuf>> {
        if let Some(dir) = &self.directory {
            return Ok(Some(dir.clone()));
        }
        if self.current || !self.rest.is_empty() {
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            return Ok(Some(cwd));
        }
        Ok(None)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_sequential(processor: &BatchProcessor, dir: &Path) -> Result<BatchReport> {
    let mut sink = FileLabelSink::new(dir);
    processor
        .process_directory(dir, &mut sink)
        .with_context(|| format!("processing {}", dir.display()))
}

#[cfg(feature = "parallel-processing")]
fn run(processor: &BatchProcessor, dir: &Path, jobs: Option<usize>) -> Result<BatchReport> {
    if jobs == Some(1) {
        return run_sequential(processor, dir);
    }
    let out = dir.to_path_buf();
    processor
        .process_directory_parallel(dir, || FileLabelSink::new(out.clone()), jobs)
        .with_context(|| format!("processing {}", dir.display()))
}

#[cfg(not(feature = "parallel-processing"))]
fn run(processor: &BatchProcessor, dir: &Path, jobs: Option<usize>) -> Result<BatchReport> {
    if jobs.is_some_and(|n| n != 1) {
        tracing::warn!("built without parallel-processing, running on one thread");
    }
    run_sequential(processor, dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.rest.is_empty() {
        tracing::warn!(ignored = ?cli.rest, "unrecognised arguments");
    }
    let Some(dir) = cli.target_dir()? else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let detector = Detector::new(cli.detector_config()).context("invalid configuration")?;

    #[cfg(feature = "progress-tracking")]
    let detector = if cli.progress {
        detector.with_progress(crosswalk_label::progress::ProgressBarReporter::new())
    } else {
        detector
    };

    let processor = BatchProcessor::new(detector);
    let report = run(&processor, &dir, cli.jobs)?;
    println!("{}", report.summary());
    Ok(())
}
