//! rtcontour-bench: CLI tool for round-trip experimentation and diagnostics.
//!
//! Loads a mask image, traces it into polygons, rasterizes them back and
//! cross-checks against flood filling, printing per-stage diagnostics.
//! Useful for:
//!
//! - Checking that a mask survives the round trip unchanged
//! - Comparing smoothing strategies and nesting depths
//! - Measuring per-stage durations on large masks
//!
//! Any nonzero pixel of the (grayscale-converted) image is foreground.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin rtcontour-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rtcontour_engine::diagnostics::{Clock, RoundTripDiagnostics};
use rtcontour_engine::{ContourConfig, Grid, SmoothingKind};
use tracing_subscriber::EnvFilter;

/// Round-trip experimentation and diagnostics for rtcontour.
///
/// Runs mask -> polygons -> mask on a given image with configurable
/// parameters and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "rtcontour-bench", version)]
struct Cli {
    /// Path to the input mask image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Nesting level assigned to top-level structures.
    #[arg(long, default_value_t = ContourConfig::DEFAULT_STARTING_NESTING_LEVEL)]
    starting_nesting_level: u32,

    /// Levels of holes and islands to trace below the top level.
    #[arg(long, default_value_t = ContourConfig::DEFAULT_MAX_NESTING_LEVEL)]
    max_nesting_level: u32,

    /// Rim smoothing strategy.
    #[arg(long, value_enum, default_value_t = Smoothing::None)]
    smoothing: Smoothing,

    /// Write the rasterized round-trip mask to a PNG file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full contour config as a JSON string.
    ///
    /// When provided, all other contour parameter flags are ignored.
    /// The JSON must be a valid `ContourConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Smoothing strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Smoothing {
    /// Follow pixel edges exactly.
    None,
    /// Cut pixel corners.
    Small,
}

/// Build a [`ContourConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<ContourConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        ContourConfig {
            starting_nesting_level: cli.starting_nesting_level,
            max_nesting_level: cli.max_nesting_level,
            smoothing: match cli.smoothing {
                Smoothing::None => SmoothingKind::None,
                Smoothing::Small => SmoothingKind::Small,
            },
        }
    };
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    Ok(config)
}

/// Decode an image file into a binary mask.
fn load_mask(path: &Path) -> Result<Grid<u8>, String> {
    let image = image::open(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    Ok(Grid::from_gray_image(&image.to_luma8()))
}

fn write_mask(path: &Path, mask: &Grid<u8>) -> Result<(), String> {
    let image = mask.to_gray_image().map_err(|e| e.to_string())?;
    image
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mask = match load_mask(&cli.image_path) {
        Ok(mask) => mask,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Mask: {} ({}x{}, {} foreground pixels)",
        cli.image_path.display(),
        mask.dim_x(),
        mask.dim_y(),
        mask.count(1),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match rtcontour_engine::diagnostics::round_trip_with_diagnostics(&mask, &config, &StdClock) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the rendered mask on the first run only.
                if run == 0
                    && let Some(ref output) = cli.output
                {
                    match write_mask(output, &result.rendered) {
                        Ok(()) => eprintln!("Mask written to {}", output.display()),
                        Err(msg) => eprintln!("{msg}"),
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Round trip error ({:?}): {e}", e.kind());
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&RoundTripDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RoundTripDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Trace", |d| d.trace.duration),
        ("Smooth + Merge", |d| d.smooth.duration),
        ("Fill", |d| d.fill.duration),
        ("Flood Fill", |d| d.flood_fill.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
