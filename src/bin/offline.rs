use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use canopy::app::config::AppConfig;
use canopy::pipeline::{process_large_image, TfliteModel};

/// Offline batch pipeline: tiles one image from disk with the smaller
/// offline tile size, tolerates per-tile failures, and prints a JSON
/// report.
#[derive(Parser, Debug)]
#[command(name = "canopy-offline", about = "Batch tree detection over one image")]
struct Args {
    /// Image to process.
    image: PathBuf,

    /// Path to a yaml configuration file; built-in defaults otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the offline tile size.
    #[arg(long)]
    tile_size: Option<u32>,

    /// Override the tile overlap.
    #[arg(long)]
    overlap: Option<u32>,
}

fn main() -> canopy::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let mut offline = config.offline.clone();
    if let Some(tile_size) = args.tile_size {
        offline.tile_size = tile_size;
    }
    if let Some(overlap) = args.overlap {
        offline.overlap = overlap;
    }
    config.validate()?;

    tracing::info!(image = %args.image.display(), "loading image");
    let image = image::open(&args.image)?.to_rgb8();
    tracing::info!(
        width = image.width(),
        height = image.height(),
        tile_size = offline.tile_size,
        "image loaded"
    );

    let mut model = TfliteModel::new(&config.model)?;
    let report = process_large_image(
        &mut model,
        &image,
        &offline,
        config.model.tile_confidence,
        config.model.iou_threshold,
    )?;

    tracing::info!(
        trees = report.total_tree_count,
        failed = report.tiles_failed,
        "processing complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
