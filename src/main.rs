use anyhow::{Context, Result, bail};
use chrono::Local;
use facecrop::{DetectorEnsemble, FaceCropper};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod batch;
mod cli;
mod progress;

/// Creates a timestamped output directory and returns its path
fn create_output_dir() -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir = PathBuf::from(format!("./runs/{}", timestamp));
    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: cli::Args = argh::from_env();

    let sources = batch::collect_sources(&args.source)?;
    if sources.is_empty() {
        bail!("no images found in {}", args.source.display());
    }

    let output_dir = match &args.output_dir {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            dir.clone()
        }
        None => create_output_dir()?,
    };
    info!(output_dir = %output_dir.display(), "created output directory");

    let assets = args.asset_config();
    if assets.is_empty() {
        warn!("no --model or --cascade given; every image will use the center crop");
    }
    let ensemble = DetectorEnsemble::load(&assets);
    info!(strategies = ?ensemble.strategy_names(), "detector ensemble ready");
    let cropper = FaceCropper::new(ensemble, args.target_size());

    let mut tracker = if sources.len() > 1 {
        progress::BatchProgressTracker::new(sources.len() as u64, "images")
    } else {
        progress::BatchProgressTracker::hidden(1)
    };
    let mut summary = batch::BatchSummary::default();

    for source in &sources {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match batch::process_file(&cropper, source, &output_dir) {
            Ok((outcome, output)) => {
                summary.record(&outcome);
                info!(
                    source = %source.display(),
                    output = %output.display(),
                    face = ?outcome.face,
                    strategy = outcome.strategy.unwrap_or("center-fallback"),
                    "cropped"
                );
            }
            Err(err) => {
                summary.record_failure();
                warn!(source = %source.display(), error = %format!("{:#}", err), "skipped image");
            }
        }
        tracker.update_image(&name);
    }
    tracker.finish();

    println!(
        "Processed {} images: {} with faces, {} center crops, {} failed. Results in {}",
        summary.total(),
        summary.faces,
        summary.fallbacks,
        summary.failures,
        output_dir.display()
    );

    Ok(())
}
