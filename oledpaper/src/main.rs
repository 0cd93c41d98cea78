use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use oledpaper::config::DEFAULT_CONFIG_PATH;
use oledpaper::{io, logging, Config, Pipeline, ProcessedResult, Threshold, WorkerEvent};

/// Blacken every pixel with a color channel below the threshold.
#[derive(Parser, Debug)]
#[command(name = "oledpaper", version)]
struct Args {
    /// Image to process (png, jpeg, bmp, tiff, ...)
    input: PathBuf,

    /// Threshold in [1, 255]; may be repeated, only the last one is guaranteed to render
    #[arg(short, long = "threshold", allow_negative_numbers = true)]
    thresholds: Vec<i64>,

    /// Output file; the format follows the extension, `.png` if there is none
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also write a preview scaled to fit WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    display: Option<(u32, u32)>,

    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    logging::init(&config)?;

    let buffer = io::load_image(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let thresholds = requested_thresholds(&args.thresholds, config.initial_threshold);
    let target = *thresholds
        .last()
        .ok_or_else(|| anyhow!("no threshold to render"))?;

    let (pipeline, rx) = Pipeline::with_channel(&config)?;
    pipeline.load_image(buffer)?;
    for threshold in &thresholds {
        pipeline.request_threshold(*threshold)?;
    }

    let result = wait_for_result(&pipeline, &rx, target, Duration::from_millis(args.timeout_ms))?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, target));
    let written = io::save_image(&result.buffer, &output)?;
    println!("{}", written.display());

    if let Some((width, height)) = args.display {
        if let Some(preview) = pipeline.display_image(width, height)? {
            let preview_path = written.with_file_name(format!(
                "{}_preview.png",
                written
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("output")
            ));
            preview
                .image()
                .save(&preview_path)
                .with_context(|| format!("Failed to write {}", preview_path.display()))?;
            println!("{}", preview_path.display());
        }
    }

    pipeline.shutdown()?;
    Ok(())
}

fn requested_thresholds(values: &[i64], initial: Threshold) -> Vec<Threshold> {
    if values.is_empty() {
        return vec![initial];
    }

    values
        .iter()
        .map(|&value| {
            let threshold = Threshold::clamped(value);
            if threshold.get() as i64 != value {
                warn!(value, clamped = %threshold, "threshold out of range, clamping");
            }
            threshold
        })
        .collect()
}

fn wait_for_result(
    pipeline: &Pipeline,
    rx: &mpsc::Receiver<WorkerEvent>,
    target: Threshold,
    timeout: Duration,
) -> Result<Arc<ProcessedResult>> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = match rx.recv_timeout(remaining) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                bail!("timed out waiting for threshold {target}")
            }
            Err(RecvTimeoutError::Disconnected) => bail!("worker exited unexpectedly"),
        };

        let current = event.threshold() == target
            && event.source_version() == pipeline.source_version();
        match event {
            WorkerEvent::Processed(result) if current => {
                info!(threshold = %target, "result ready");
                return Ok(result);
            }
            WorkerEvent::Failed { error, .. } if current => return Err(error.into()),
            _ => {}
        }
    }
}

fn default_output_path(input: &Path, threshold: Threshold) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_t{threshold}.png"))
}

fn parse_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;

    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| format!("invalid dimension {s:?}"))
    };

    Ok((parse(width)?, parse(height)?))
}
