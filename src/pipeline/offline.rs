use std::time::Instant;

use image::RgbImage;
use serde::Serialize;

use crate::app::config::OfflineConfig;
use crate::error::{Error, Result};
use crate::pipeline::{merge_tile_detections, tile_grid, Detections, TreeModel};

/// Report for the tolerant multi-tile pipeline. Failed tiles are counted
/// and excluded from the merge instead of aborting the run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineReport {
    pub total_tree_count: usize,
    pub total_time: f64,
    pub average_tile_time: f64,
    pub tiles_processed: usize,
    pub tiles_failed: usize,
    pub all_detections: Detections,
}

/// Tiles the image and processes every tile independently, recording
/// per-tile failures and merging whatever succeeded. This is the batch
/// counterpart to the fail-fast server path in `process.rs`.
pub fn process_large_image(
    model: &mut dyn TreeModel,
    image: &RgbImage,
    offline: &OfflineConfig,
    confidence: f32,
    iou: f32,
) -> Result<OfflineReport> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidImage("zero-dimension image".to_string()));
    }

    let tiles = tile_grid(image, offline.tile_size, offline.overlap, offline.min_extent)?;
    if tiles.is_empty() {
        return Err(Error::InvalidImage(
            "no usable tiles produced from image".to_string(),
        ));
    }
    let total = tiles.len();

    let mut per_tile = Vec::with_capacity(total);
    let mut tiles_failed = 0;
    let mut tile_time = 0.0f64;

    for (index, tile) in tiles.iter().enumerate() {
        tracing::info!(tile = index + 1, total, position = ?tile.position, "processing tile");
        let started = Instant::now();
        match model.infer(&tile.pixels, confidence, iou) {
            Ok(detections) => {
                tile_time += started.elapsed().as_secs_f64();
                per_tile.push((detections, tile.position));
            }
            Err(err) => {
                tracing::warn!(position = ?tile.position, %err, "tile failed, continuing");
                tiles_failed += 1;
            }
        }
    }

    let merged = merge_tile_detections(&per_tile, width, height);
    let tiles_processed = total - tiles_failed;

    Ok(OfflineReport {
        total_tree_count: merged.len(),
        total_time: round2(tile_time),
        average_tile_time: round2(tile_time / total as f64),
        tiles_processed,
        tiles_failed,
        all_detections: merged,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
